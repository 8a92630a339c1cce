//! Environment-driven configuration.
//!
//! Every credential and base URL comes from the process environment, usually
//! populated from a `.env` file by the binary before [`Config::from_env`] is
//! called. The category table is deliberately not part of this.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::error::SyncErr;
use crate::http::RetryPolicy;

pub const JAMF_URL_ENV_VAR: &str = "JAMF_URL";
pub const JAMF_CLIENT_ID_ENV_VAR: &str = "JAMF_CLIENT_ID";
pub const JAMF_CLIENT_SECRET_ENV_VAR: &str = "JAMF_CLIENT_SECRET";
pub const KANDJI_BASE_URL_ENV_VAR: &str = "KANDJI_BASE_URL";
pub const KANDJI_API_TOKEN_ENV_VAR: &str = "KANDJI_API_TOKEN";
pub const KANDJI_BLUEPRINT_ID_ENV_VAR: &str = "KANDJI_BLUEPRINT_ID";
pub const INTUNE_GRAPH_URL_ENV_VAR: &str = "INTUNE_GRAPH_URL";
pub const INTUNE_ACCESS_TOKEN_ENV_VAR: &str = "INTUNE_ACCESS_TOKEN";
pub const INTUNE_EXPORT_FILE_ENV_VAR: &str = "INTUNE_EXPORT_FILE";
pub const SNIPE_IT_URL_ENV_VAR: &str = "SNIPE_IT_URL";
pub const SNIPE_IT_API_TOKEN_ENV_VAR: &str = "SNIPE_IT_API_TOKEN";
pub const SNIPE_IT_MANUFACTURER_ID_ENV_VAR: &str = "SNIPE_IT_MANUFACTURER_ID";
pub const SNIPE_IT_STATUS_ID_ENV_VAR: &str = "SNIPE_IT_STATUS_ID";

const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";

/// Manufacturer id used when creating models (Apple on the reference
/// instance). Override with `SNIPE_IT_MANUFACTURER_ID`.
pub const DEFAULT_MANUFACTURER_ID: u64 = 9;
/// Snipe-IT "Ready to Deploy".
pub const DEFAULT_STATUS_ID: u64 = 2;

#[derive(Debug, Clone)]
pub struct JamfConfig {
    pub base_url: Url,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct KandjiConfig {
    pub base_url: Url,
    pub api_token: String,
    pub blueprint_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IntuneConfig {
    /// Live Microsoft Graph listing with a pre-acquired bearer token.
    Graph { graph_url: Url, access_token: String },
    /// A JSON array of managed-device objects exported ahead of time.
    ExportFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SnipeConfig {
    pub base_url: Url,
    pub api_token: String,
    pub manufacturer_id: u64,
    pub status_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub request_delay: Duration,
    pub jitter: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub detail_workers: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1500),
            jitter: Duration::from_millis(200),
            max_retries: 5,
            retry_base: Duration::from_millis(5000),
            detail_workers: 5,
            batch_size: 100,
            batch_delay: Duration::from_millis(10_000),
        }
    }
}

impl RateLimitConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            // The first attempt is not a retry.
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: self.retry_base,
            max_delay: self.retry_base.saturating_mul(8),
            request_delay: self.request_delay,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jamf: Option<JamfConfig>,
    pub kandji: Option<KandjiConfig>,
    pub intune: Option<IntuneConfig>,
    pub snipe: SnipeConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(SyncErr::MissingEnv(key));

        let snipe = SnipeConfig {
            base_url: parse_url(SNIPE_IT_URL_ENV_VAR, &require(SNIPE_IT_URL_ENV_VAR)?)?,
            api_token: require(SNIPE_IT_API_TOKEN_ENV_VAR)?,
            manufacturer_id: parse_or(
                SNIPE_IT_MANUFACTURER_ID_ENV_VAR,
                get(SNIPE_IT_MANUFACTURER_ID_ENV_VAR),
                DEFAULT_MANUFACTURER_ID,
            )?,
            status_id: parse_or(
                SNIPE_IT_STATUS_ID_ENV_VAR,
                get(SNIPE_IT_STATUS_ID_ENV_VAR),
                DEFAULT_STATUS_ID,
            )?,
        };

        let jamf = match get(JAMF_URL_ENV_VAR) {
            Some(url) => Some(JamfConfig {
                base_url: parse_url(JAMF_URL_ENV_VAR, &url)?,
                client_id: require(JAMF_CLIENT_ID_ENV_VAR)?,
                client_secret: require(JAMF_CLIENT_SECRET_ENV_VAR)?,
            }),
            None => None,
        };

        let kandji = match get(KANDJI_BASE_URL_ENV_VAR) {
            Some(url) => Some(KandjiConfig {
                base_url: parse_url(KANDJI_BASE_URL_ENV_VAR, &url)?,
                api_token: require(KANDJI_API_TOKEN_ENV_VAR)?,
                blueprint_id: get(KANDJI_BLUEPRINT_ID_ENV_VAR),
            }),
            None => None,
        };

        let intune = if let Some(token) = get(INTUNE_ACCESS_TOKEN_ENV_VAR) {
            let graph = get(INTUNE_GRAPH_URL_ENV_VAR).unwrap_or_else(|| DEFAULT_GRAPH_URL.into());
            Some(IntuneConfig::Graph {
                graph_url: parse_url(INTUNE_GRAPH_URL_ENV_VAR, &graph)?,
                access_token: token,
            })
        } else {
            get(INTUNE_EXPORT_FILE_ENV_VAR).map(|path| IntuneConfig::ExportFile(PathBuf::from(path)))
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            request_delay: parse_millis("SYNC_RATE_LIMIT_DELAY_MS", &get, defaults.request_delay)?,
            jitter: parse_millis("SYNC_JITTER_MS", &get, defaults.jitter)?,
            max_retries: parse_or(
                "SYNC_MAX_RETRIES",
                get("SYNC_MAX_RETRIES"),
                defaults.max_retries,
            )?,
            retry_base: parse_millis("SYNC_RETRY_BASE_MS", &get, defaults.retry_base)?,
            detail_workers: parse_or::<usize>(
                "SYNC_DETAIL_WORKERS",
                get("SYNC_DETAIL_WORKERS"),
                defaults.detail_workers,
            )?
            .clamp(1, 8),
            batch_size: parse_or::<usize>(
                "SYNC_BATCH_SIZE",
                get("SYNC_BATCH_SIZE"),
                defaults.batch_size,
            )?
            .max(1),
            batch_delay: parse_millis("SYNC_BATCH_DELAY_MS", &get, defaults.batch_delay)?,
        };

        Ok(Self {
            jamf,
            kandji,
            intune,
            snipe,
            rate_limit,
        })
    }

    pub fn has_any_source(&self) -> bool {
        self.jamf.is_some() || self.kandji.is_some() || self.intune.is_some()
    }
}

/// Masks a secret for display, keeping a short prefix when it is long enough
/// that the prefix does not give the value away.
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() <= 10 {
        return "***".to_string();
    }
    let prefix: String = value.chars().take(6).collect();
    format!("{prefix}...")
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim_end_matches('/')).map_err(|err| SyncErr::InvalidEnv {
        name,
        reason: format!("{raw:?} is not a valid URL ({err})"),
    })
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse::<T>().map_err(|err| SyncErr::InvalidEnv {
            name,
            reason: format!("{value:?}: {err}"),
        }),
        None => Ok(default),
    }
}

fn parse_millis<F>(name: &'static str, get: &F, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse_or::<u64>(name, get(name), default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn snipe_settings_are_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, SyncErr::MissingEnv(SNIPE_IT_URL_ENV_VAR)));
    }

    #[test]
    fn jamf_url_without_credentials_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("SNIPE_IT_URL", "https://snipe.example.org"),
            ("SNIPE_IT_API_TOKEN", "token"),
            ("JAMF_URL", "https://school.jamfcloud.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SyncErr::MissingEnv(JAMF_CLIENT_ID_ENV_VAR)));
    }

    #[test]
    fn defaults_apply_when_tuning_vars_are_absent() {
        let config = Config::from_lookup(lookup(&[
            ("SNIPE_IT_URL", "https://snipe.example.org/"),
            ("SNIPE_IT_API_TOKEN", "token"),
            ("KANDJI_BASE_URL", "https://school.api.kandji.io"),
            ("KANDJI_API_TOKEN", "kandji"),
            ("INTUNE_EXPORT_FILE", "intune_devices.json"),
        ]))
        .unwrap();

        assert_eq!(config.snipe.manufacturer_id, DEFAULT_MANUFACTURER_ID);
        assert_eq!(config.snipe.status_id, DEFAULT_STATUS_ID);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert!(config.jamf.is_none());
        assert!(config.kandji.is_some());
        assert!(matches!(config.intune, Some(IntuneConfig::ExportFile(_))));
        assert!(config.has_any_source());
    }

    #[test]
    fn worker_count_is_clamped() {
        let config = Config::from_lookup(lookup(&[
            ("SNIPE_IT_URL", "https://snipe.example.org"),
            ("SNIPE_IT_API_TOKEN", "token"),
            ("SYNC_DETAIL_WORKERS", "32"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limit.detail_workers, 8);
    }

    #[test]
    fn retries_come_on_top_of_the_first_attempt() {
        let config = Config::from_lookup(lookup(&[
            ("SNIPE_IT_URL", "https://snipe.example.org"),
            ("SNIPE_IT_API_TOKEN", "token"),
            ("SYNC_MAX_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limit.retry_policy().max_attempts, 1);
        assert_eq!(RateLimitConfig::default().retry_policy().max_attempts, 6);
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("SNIPE_IT_URL", "https://snipe.example.org"),
            ("SNIPE_IT_API_TOKEN", "token"),
            ("SYNC_MAX_RETRIES", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SYNC_MAX_RETRIES"));
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("abcdefghijklmnop"), "abcdef...");
    }
}
