use std::path::Path;

use anyhow::Context;
use snipesync_core::config::Config;
use snipesync_core::device::SourceKind;
use snipesync_core::http::RetryingClient;
use snipesync_core::snipe::SnipeClient;
use snipesync_core::sources;
use snipesync_core::sources::DeviceSource;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Loads `--env-file` when given, otherwise an optional `.env` from the
/// working directory or its parents.
pub(crate) fn load_env_file(env_file: Option<&Path>) -> anyhow::Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            // A missing .env is fine; the variables may already be exported.
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

/// Everything a command needs to talk to Snipe-IT and the MDMs.
pub(crate) struct AppContext {
    pub config: Config,
    pub http: RetryingClient,
    pub snipe: SnipeClient,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::from_env().context("invalid configuration")?;
        let http = RetryingClient::new(config.rate_limit.retry_policy())
            .context("failed to build HTTP client")?;
        let snipe = SnipeClient::new(http.clone(), &config.snipe);
        Ok(Self {
            config,
            http,
            snipe,
            cancel: shutdown_token(),
        })
    }

    pub fn sources(&self, only: &[SourceKind]) -> anyhow::Result<Vec<Box<dyn DeviceSource>>> {
        sources::build_sources(&self.config, &self.http, only)
            .context("failed to set up device sources")
    }

    /// Awaits `fut` unless Ctrl-C arrives first.
    pub async fn interruptible<F: Future>(&self, fut: F) -> anyhow::Result<F::Output> {
        interruptible(&self.cancel, fut).await
    }
}

/// Fetch and listing phases have no record boundary to stop at, so they are
/// dropped as soon as `cancel` fires.
pub(crate) async fn interruptible<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> anyhow::Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(anyhow::anyhow!("interrupted")),
        output = fut => Ok(output),
    }
}

/// Token cancelled on the first Ctrl-C so in-flight work can stop between
/// records. A second Ctrl-C exits immediately.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, stopping after the current step (Ctrl-C again to quit now)");
        child.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt received, exiting");
            std::process::exit(130);
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn interruptible_drops_pending_work_once_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = interruptible(&cancel, tokio::time::sleep(Duration::from_secs(60)))
            .await
            .expect_err("cancelled");
        assert_eq!(err.to_string(), "interrupted");
    }

    #[tokio::test]
    async fn interruptible_passes_through_finished_work() {
        let cancel = CancellationToken::new();
        let value = interruptible(&cancel, async { 7 }).await.expect("not cancelled");
        assert_eq!(value, 7);
    }
}
