use std::path::Path;

use anyhow::Context;
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::GlobalArgs;

/// `snipesync_<command>_<YYYYmmdd_HHMMSS>.log`
pub fn log_file_name(command: &str, started: chrono::DateTime<Local>) -> String {
    format!("snipesync_{command}_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Installs the stderr subscriber plus the per-run log file. The returned
/// guard must stay alive until exit or buffered lines are lost.
pub fn init(args: &GlobalArgs, command: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = if args.no_log_file {
        (None, None)
    } else {
        let file_name = prepare_log_dir(&args.log_dir, command)?;
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
            &args.log_dir,
            file_name,
        ));
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    // A subscriber may already be set (e.g. in tests); keep using it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Ok(guard)
}

fn prepare_log_dir(log_dir: &Path, command: &str) -> anyhow::Result<String> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    Ok(log_file_name(command, Local::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_name_carries_command_and_timestamp() {
        let started = Local
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 1)
            .single()
            .expect("valid time");
        assert_eq!(
            log_file_name("fix_manufacturer", started),
            "snipesync_fix_manufacturer_20240307_090501.log"
        );
    }

    #[test]
    fn log_dir_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("logs").join("runs");
        let name = prepare_log_dir(&nested, "sync").expect("log dir");
        assert!(nested.is_dir());
        assert!(name.starts_with("snipesync_sync_"));
    }
}
