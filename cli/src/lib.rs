pub mod check_cmd;
pub mod clean_cmd;
mod context;
pub mod fix_cmd;
pub mod logging;
mod output;
mod prompt;
pub mod sync_cmd;
pub mod verify_cmd;
pub mod wipe_cmd;

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::check_cmd::CheckArgs;
use crate::clean_cmd::CleanArgs;
use crate::fix_cmd::FixManufacturerArgs;
use crate::sync_cmd::SyncArgs;
use crate::verify_cmd::VerifyArgs;
use crate::wipe_cmd::WipeArgs;

/// Reconcile MDM device inventories (Jamf Pro, Kandji, Intune) into Snipe-IT.
#[derive(Debug, Parser)]
#[command(name = "snipesync", version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Directory that receives the per-run log file.
    #[arg(long = "log-dir", global = true, value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Only log to stderr.
    #[arg(long = "no-log-file", global = true)]
    pub no_log_file: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update Snipe-IT assets from the configured MDM sources.
    Sync(SyncArgs),

    /// Compare MDM serials with Snipe-IT and report coverage.
    Verify(VerifyArgs),

    /// Delete Snipe-IT assets that no MDM source reports any more.
    Clean(CleanArgs),

    /// Delete every Snipe-IT asset, optionally filtered by manufacturer.
    Wipe(WipeArgs),

    /// Re-point Apple models at the configured manufacturer.
    FixManufacturer(FixManufacturerArgs),

    /// Show the environment and test every configured connection.
    Check(CheckArgs),
}

impl Command {
    /// Short name used for the log file.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Sync(_) => "sync",
            Command::Verify(_) => "verify",
            Command::Clean(_) => "clean",
            Command::Wipe(_) => "wipe",
            Command::FixManufacturer(_) => "fix_manufacturer",
            Command::Check(_) => "check",
        }
    }
}

/// Runs the parsed command. `Ok(false)` means the command finished but
/// something failed or was cancelled.
pub async fn run(cli: Cli) -> anyhow::Result<bool> {
    context::load_env_file(cli.global.env_file.as_deref())?;
    let _log_guard = logging::init(&cli.global, cli.command.name())?;

    match cli.command {
        Command::Sync(args) => sync_cmd::run(args).await,
        Command::Verify(args) => verify_cmd::run(args).await,
        Command::Clean(args) => clean_cmd::run(args).await,
        Command::Wipe(args) => wipe_cmd::run(args).await,
        Command::FixManufacturer(args) => fix_cmd::run(args).await,
        Command::Check(args) => check_cmd::run(args).await,
    }
}
