use anyhow::Context;
use clap::Parser;
use snipesync_core::clean::CleanMode;
use snipesync_core::manufacturer;

use crate::context::AppContext;
use crate::output::PREVIEW_LIMIT;
use crate::output::Palette;
use crate::prompt;

#[derive(Debug, Parser)]
pub struct FixManufacturerArgs {
    /// Only move models currently assigned to this manufacturer id.
    #[arg(long = "from", value_name = "ID")]
    pub from_id: Option<u64>,

    /// List the models that would change.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(args: FixManufacturerArgs) -> anyhow::Result<bool> {
    let ctx = AppContext::load()?;
    let target_id = ctx.config.snipe.manufacturer_id;
    let models = ctx
        .interruptible(ctx.snipe.list_models())
        .await?
        .context("failed to list Snipe-IT models")?;
    let fixes = manufacturer::plan_manufacturer_fix(&models, target_id, args.from_id);

    let palette = Palette::stdout();
    if fixes.is_empty() {
        println!(
            "{}",
            palette.ok(&format!("All Apple models already use manufacturer {target_id}."))
        );
        return Ok(true);
    }
    println!(
        "{} Apple models are not assigned to manufacturer {target_id}:",
        fixes.len()
    );
    for fix in fixes.iter().take(PREVIEW_LIMIT) {
        let current = match (&fix.current_manufacturer, fix.current_manufacturer_id) {
            (Some(name), Some(id)) => format!("{name} ({id})"),
            (None, Some(id)) => id.to_string(),
            _ => "none".to_string(),
        };
        println!("  #{:<6} {:<40} {current}", fix.model_id, fix.model_name);
    }
    if fixes.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", fixes.len() - PREVIEW_LIMIT);
    }

    let mode = if args.dry_run {
        CleanMode::DryRun
    } else if args.yes
        || prompt::confirm(&format!(
            "Move {} models to manufacturer {target_id}?",
            fixes.len()
        ))?
    {
        CleanMode::Execute
    } else {
        println!("Aborted, no models were changed.");
        return Ok(false);
    };

    let report =
        manufacturer::apply_manufacturer_fix(&ctx.snipe, &fixes, target_id, mode, &ctx.cancel)
            .await;
    if mode == CleanMode::DryRun {
        println!("Dry run: {} models would be updated.", report.planned);
        return Ok(true);
    }
    println!("Updated {} of {} models.", report.updated, report.planned);
    if report.cancelled {
        println!("{}", palette.warn("Cancelled before all models were updated."));
    }
    for (model_id, reason) in &report.failed {
        println!("  {} #{model_id}: {reason}", palette.err("failed"));
    }
    Ok(report.is_success())
}
