use anyhow::Context;
use clap::Parser;
use snipesync_core::clean;
use tracing::warn;

use crate::clean_cmd::deletion_mode;
use crate::clean_cmd::print_deletion_report;
use crate::context::AppContext;
use crate::output::Palette;
use crate::output::print_targets;
use crate::prompt::WIPE_PHRASE;

#[derive(Debug, Parser)]
pub struct WipeArgs {
    /// Only delete assets whose manufacturer name contains NAME
    /// (case-insensitive), e.g. `apple`.
    #[arg(long, value_name = "NAME")]
    pub manufacturer: Option<String>,

    /// List what would be deleted.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip both confirmation prompts.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(args: WipeArgs) -> anyhow::Result<bool> {
    let ctx = AppContext::load()?;
    let assets = ctx
        .interruptible(ctx.snipe.list_hardware())
        .await?
        .context("failed to list Snipe-IT hardware")?;
    let targets = clean::plan_wipe(&assets, args.manufacturer.as_deref());

    let palette = Palette::stdout();
    let scope = match &args.manufacturer {
        Some(name) => format!("assets from manufacturers matching '{name}'"),
        None => "assets".to_string(),
    };
    if targets.is_empty() {
        println!("No {scope} to delete.");
        return Ok(true);
    }
    println!(
        "{}",
        palette.warn(&format!(
            "About to delete {} of {} Snipe-IT {scope}:",
            targets.len(),
            assets.len()
        ))
    );
    print_targets(&targets);

    if !args.dry_run {
        warn!("wiping {} {scope} from Snipe-IT", targets.len());
    }
    let question = format!(
        "Permanently delete {} assets? This cannot be undone.",
        targets.len()
    );
    let Some(mode) = deletion_mode(args.dry_run, args.yes, &question, Some(WIPE_PHRASE))? else {
        println!("Aborted, nothing was deleted.");
        return Ok(false);
    };
    let report = clean::execute(&ctx.snipe, &targets, mode, &ctx.cancel).await;
    print_deletion_report(palette, &report);
    Ok(report.is_success())
}
