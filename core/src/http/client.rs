use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::warn;

use super::retry::RetryPolicy;
use super::retry::parse_retry_after;
use crate::error::Result;
use crate::error::SyncErr;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("snipesync/", env!("CARGO_PKG_VERSION"));

/// Counters shared by every clone of a [`RetryingClient`].
#[derive(Debug, Default)]
pub struct HttpStats {
    calls: AtomicU64,
    retries: AtomicU64,
}

impl HttpStats {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// `reqwest::Client` wrapper applying a [`RetryPolicy`] to every request.
///
/// 429 responses wait for `Retry-After` (or the backoff when absent), 5xx
/// responses and transport failures back off exponentially, and every other
/// non-success status is returned to the caller immediately.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    policy: RetryPolicy,
    stats: Arc<HttpStats>,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(http, policy))
    }

    pub fn with_client(http: Client, policy: RetryPolicy) -> Self {
        Self {
            http,
            policy,
            stats: Arc::new(HttpStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<HttpStats> {
        Arc::clone(&self.stats)
    }

    /// Sends the request produced by `build`, rebuilding it for each attempt.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure = String::new();
        let mut target = String::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                self.stats.retries.fetch_add(1, Ordering::Relaxed);
            }
            let pause = self.policy.pacing();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let request = build(&self.http).build()?;
            let method = request.method().to_string();
            target = request.url().to_string();
            self.stats.calls.fetch_add(1, Ordering::Relaxed);
            debug!(%method, url = %target, attempt = attempt + 1, "sending request");

            let response = match self.http.execute(request).await {
                Ok(response) => response,
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    let wait = self.policy.backoff(attempt);
                    warn!(
                        url = %target,
                        attempt = attempt + 1,
                        "transport error, retrying in {wait:?}: {err}"
                    );
                    last_failure = err.to_string();
                    wait_before_retry(attempt, max_attempts, wait).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after)
                    .unwrap_or_else(|| self.policy.backoff(attempt));
                warn!(url = %target, attempt = attempt + 1, "rate limited, waiting {wait:?}");
                last_failure = status.to_string();
                wait_before_retry(attempt, max_attempts, wait).await;
                continue;
            }

            if status.is_server_error() {
                let wait = self.policy.backoff(attempt);
                warn!(url = %target, attempt = attempt + 1, "server error {status}, retrying in {wait:?}");
                last_failure = status.to_string();
                wait_before_retry(attempt, max_attempts, wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(SyncErr::Http {
                method,
                url: target,
                status,
                body: truncate(&body, 500),
            });
        }

        Err(SyncErr::RetriesExhausted {
            url: target,
            attempts: max_attempts,
            last: last_failure,
        })
    }

    /// Like [`RetryingClient::send`], decoding the body as JSON.
    pub async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send(build).await?;
        let url = response.url().to_string();
        let body = response.text().await?;
        decode_json(&url, &body)
    }
}

/// Sleeps before the next attempt; after the final one there is nothing to
/// wait for.
async fn wait_before_retry(attempt: u32, max_attempts: u32, wait: Duration) {
    if attempt + 1 < max_attempts && !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return Err(SyncErr::Decode {
            url: url.to_string(),
            reason: "received HTML instead of JSON (check the API token and subscription)"
                .to_string(),
        });
    }
    serde_json::from_str(trimmed).map_err(|err| SyncErr::Decode {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

fn truncate(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let head: String = body.chars().take(max_chars).collect();
    format!("{head}...")
}
