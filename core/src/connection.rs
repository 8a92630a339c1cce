//! Environment and connectivity checks behind `snipesync check`.

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::config;
use crate::config::mask_secret;
use crate::snipe::SnipeClient;
use crate::sources::DeviceSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvEntry {
    pub name: &'static str,
    /// Masked when the variable holds a secret; `None` when unset.
    pub display: Option<String>,
    pub required: bool,
}

const ENV_VARS: &[(&str, bool, bool)] = &[
    // (name, required, secret)
    (config::SNIPE_IT_URL_ENV_VAR, true, false),
    (config::SNIPE_IT_API_TOKEN_ENV_VAR, true, true),
    (config::JAMF_URL_ENV_VAR, false, false),
    (config::JAMF_CLIENT_ID_ENV_VAR, false, true),
    (config::JAMF_CLIENT_SECRET_ENV_VAR, false, true),
    (config::KANDJI_BASE_URL_ENV_VAR, false, false),
    (config::KANDJI_API_TOKEN_ENV_VAR, false, true),
    (config::KANDJI_BLUEPRINT_ID_ENV_VAR, false, false),
    (config::INTUNE_GRAPH_URL_ENV_VAR, false, false),
    (config::INTUNE_ACCESS_TOKEN_ENV_VAR, false, true),
    (config::INTUNE_EXPORT_FILE_ENV_VAR, false, false),
];

pub fn env_report<F>(lookup: F) -> Vec<EnvEntry>
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VARS
        .iter()
        .map(|&(name, required, secret)| {
            let display = lookup(name)
                .filter(|value| !value.trim().is_empty())
                .map(|value| if secret { mask_secret(&value) } else { value });
            EnvEntry {
                name,
                display,
                required,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub service: String,
    pub ok: bool,
    pub detail: String,
}

pub async fn check_connections(
    snipe: &SnipeClient,
    sources: &[Box<dyn DeviceSource>],
) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let snipe_result = match snipe.ping().await {
        Ok(total) => CheckResult {
            service: "Snipe-IT".to_string(),
            ok: true,
            detail: format!("{total} assets"),
        },
        Err(err) => CheckResult {
            service: "Snipe-IT".to_string(),
            ok: false,
            detail: err.to_string(),
        },
    };
    results.push(snipe_result);

    for source in sources {
        let result = match source.ping().await {
            Ok(detail) => CheckResult {
                service: source.kind().to_string(),
                ok: true,
                detail,
            },
            Err(err) => CheckResult {
                service: source.kind().to_string(),
                ok: false,
                detail: err.to_string(),
            },
        };
        results.push(result);
    }

    for result in &results {
        if result.ok {
            info!("{} connection ok: {}", result.service, result.detail);
        } else {
            warn!("{} connection failed: {}", result.service, result.detail);
        }
    }
    results
}
