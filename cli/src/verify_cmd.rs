use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use snipesync_core::device::SourceKind;
use snipesync_core::sources;
use snipesync_core::verify;
use snipesync_core::verify::AssetIndex;
use snipesync_core::verify::SourceSerials;
use snipesync_core::verify::VerifyReport;
use tracing::info;

use crate::context::AppContext;
use crate::output::Palette;
use crate::output::print_preview;

#[derive(Debug, Parser)]
pub struct VerifyArgs {
    /// Restrict the comparison to these sources (repeatable).
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<SourceKind>,

    /// Write the missing serials to PATH (.json, .csv or plain text).
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Print the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: VerifyArgs) -> anyhow::Result<bool> {
    let ctx = AppContext::load()?;
    let sources = ctx.sources(&args.sources)?;
    let serials = ctx
        .interruptible(sources::collect_serials(&sources))
        .await?
        .context("failed to read serials from the MDM sources")?;

    let report = compare_with_snipe(&ctx, &serials).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(Palette::stdout(), &report);
    }

    if let Some(path) = &args.export {
        verify::export_missing(path, &report.missing)
            .with_context(|| format!("failed to export missing devices to {}", path.display()))?;
        info!("exported {} missing serials to {}", report.missing.len(), path.display());
    }

    Ok(report.is_complete())
}

pub(crate) async fn compare_with_snipe(
    ctx: &AppContext,
    serials: &SourceSerials,
) -> anyhow::Result<VerifyReport> {
    let assets = ctx
        .interruptible(ctx.snipe.list_hardware())
        .await?
        .context("failed to list Snipe-IT hardware")?;
    let index = AssetIndex::from_assets(assets);
    Ok(verify::compare(serials, &index))
}

pub(crate) fn print_report(palette: Palette, report: &VerifyReport) {
    println!("{}", palette.bold("Verification"));
    for coverage in &report.per_source {
        println!(
            "  {:<8} {} devices, {} in Snipe-IT",
            coverage.source.label(),
            coverage.total,
            coverage.found
        );
    }
    println!("  MDM devices        {}", report.source_total);
    println!("  Snipe-IT assets    {}", report.target_total);
    println!("  Found              {}", report.found);
    println!("  Missing            {}", report.missing.len());
    println!("  Not in any MDM     {}", report.extra.len());
    println!("  Accuracy           {:.1}%", report.accuracy);
    println!(
        "  Assigned to users  {} ({:.1}%)",
        report.assigned, report.assignment_coverage
    );
    println!("  Health             {}", palette.health(report.health()));
    print_preview("Missing from Snipe-IT", &report.missing);
    print_preview("In Snipe-IT but not in any MDM", &report.extra);
}
