use anyhow::Context;
use clap::Parser;
use snipesync_core::clean;
use snipesync_core::clean::CleanMode;
use snipesync_core::clean::DeletionReport;
use snipesync_core::device::SourceKind;
use snipesync_core::sources;
use snipesync_core::verify::AssetIndex;
use tracing::error;

use crate::context::AppContext;
use crate::output::Palette;
use crate::output::print_targets;
use crate::prompt;

#[derive(Debug, Parser)]
pub struct CleanArgs {
    /// Only consider serials from these sources (repeatable). Assets known
    /// only to the other sources become orphans, so use with care.
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<SourceKind>,

    /// List the orphans without deleting them.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(args: CleanArgs) -> anyhow::Result<bool> {
    let ctx = AppContext::load()?;
    let sources = ctx.sources(&args.sources)?;
    let serials = ctx
        .interruptible(sources::collect_serials(&sources))
        .await?
        .context("failed to read serials from the MDM sources")?;
    if serials.union().is_empty() {
        error!("the MDM sources reported no devices; refusing to clean");
        return Ok(false);
    }

    let assets = ctx
        .interruptible(ctx.snipe.list_hardware())
        .await?
        .context("failed to list Snipe-IT hardware")?;
    let index = AssetIndex::from_assets(assets);
    let orphans = clean::plan_clean(&index, &serials);

    let palette = Palette::stdout();
    if orphans.is_empty() {
        println!("{}", palette.ok("Snipe-IT has no assets missing from the MDMs."));
        return Ok(true);
    }
    println!(
        "{} of {} Snipe-IT assets are not reported by any MDM:",
        orphans.len(),
        index.len()
    );
    print_targets(&orphans);

    let question = format!("Delete these {} assets from Snipe-IT?", orphans.len());
    let Some(mode) = deletion_mode(args.dry_run, args.yes, &question, None)? else {
        println!("Aborted, nothing was deleted.");
        return Ok(false);
    };
    let report = clean::execute(&ctx.snipe, &orphans, mode, &ctx.cancel).await;
    print_deletion_report(palette, &report);
    Ok(report.is_success())
}

/// Resolves how a deletion should run. `None` means the user declined.
pub(crate) fn deletion_mode(
    dry_run: bool,
    yes: bool,
    question: &str,
    phrase: Option<&str>,
) -> anyhow::Result<Option<CleanMode>> {
    if dry_run {
        return Ok(Some(CleanMode::DryRun));
    }
    if yes {
        return Ok(Some(CleanMode::Execute));
    }
    if !prompt::confirm(question)? {
        return Ok(None);
    }
    match phrase {
        Some(phrase) if !prompt::confirm_phrase(phrase)? => Ok(None),
        _ => Ok(Some(CleanMode::Execute)),
    }
}

pub(crate) fn print_deletion_report(palette: Palette, report: &DeletionReport) {
    if report.dry_run {
        println!("Dry run: {} assets would be deleted.", report.planned);
        return;
    }
    println!("Deleted {} of {} assets.", report.deleted, report.planned);
    if report.cancelled {
        println!("{}", palette.warn("Cancelled before all assets were deleted."));
    }
    if !report.failed.is_empty() {
        println!("{}", palette.err(&format!("{} deletions failed:", report.failed.len())));
        for (asset_id, reason) in &report.failed {
            println!("  #{asset_id}: {reason}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dry_run_wins_over_yes() {
        let mode = deletion_mode(true, true, "unused", Some("DELETE ALL")).expect("mode");
        assert_eq!(mode, Some(CleanMode::DryRun));
    }

    #[test]
    fn yes_skips_every_prompt() {
        let mode = deletion_mode(false, true, "unused", Some("DELETE ALL")).expect("mode");
        assert_eq!(mode, Some(CleanMode::Execute));
    }
}
