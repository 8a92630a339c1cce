use anyhow::Context;
use clap::Parser;
use snipesync_core::device::DeviceRecord;
use snipesync_core::device::SourceKind;
use snipesync_core::reconcile::ReconcileOptions;
use snipesync_core::reconcile::Reconciler;
use snipesync_core::resolver::LookupCache;
use snipesync_core::resolver::Resolver;
use snipesync_core::sources;
use snipesync_core::verify::SourceSerials;
use tracing::info;
use tracing::warn;

use crate::context::AppContext;
use crate::output::Palette;
use crate::verify_cmd;

#[derive(Debug, Parser)]
pub struct SyncArgs {
    /// Only sync these sources (repeatable). Defaults to every configured one.
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<SourceKind>,

    /// Classify and plan without writing to Snipe-IT.
    #[arg(long)]
    pub dry_run: bool,

    /// Records per batch; overrides SYNC_BATCH_SIZE.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Stop after the first N devices.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Skip the verification pass after a successful sync.
    #[arg(long)]
    pub skip_verify: bool,
}

pub async fn run(args: SyncArgs) -> anyhow::Result<bool> {
    let ctx = AppContext::load()?;
    let sources = ctx.sources(&args.sources)?;
    let mut records = ctx
        .interruptible(sources::fetch_all(&sources))
        .await?
        .context("failed to fetch devices from the MDM sources")?;
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }
    info!(
        "syncing {} devices{}",
        records.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let options = ReconcileOptions {
        status_id: ctx.config.snipe.status_id,
        batch_size: args
            .batch_size
            .map_or(ctx.config.rate_limit.batch_size, |size| size as usize),
        batch_delay: ctx.config.rate_limit.batch_delay,
        dry_run: args.dry_run,
    };
    let resolver = Resolver::new(
        ctx.snipe.clone(),
        LookupCache::new(),
        ctx.config.snipe.manufacturer_id,
    );
    let reconciler = Reconciler::new(ctx.snipe.clone(), resolver, options);
    let summary = reconciler.run(&records, &ctx.cancel).await;

    let palette = Palette::stdout();
    println!("{}", palette.bold("Sync summary"));
    print!("{}", summary.render_table());
    let cache = reconciler.resolver().cache().stats();
    info!("lookup cache: {} hits, {} misses", cache.hits, cache.misses);

    if args.dry_run || summary.cancelled || args.skip_verify {
        return Ok(summary.is_success());
    }

    let serials = source_serials(&records);
    match verify_cmd::compare_with_snipe(&ctx, &serials).await {
        Ok(report) => {
            println!();
            verify_cmd::print_report(palette, &report);
        }
        Err(err) => warn!("post-sync verification failed: {err:#}"),
    }
    Ok(summary.is_success())
}

/// Serials of the synced records grouped by source.
fn source_serials(records: &[DeviceRecord]) -> SourceSerials {
    let mut serials = SourceSerials::new();
    for record in records.iter().filter(|record| record.has_serial()) {
        serials.insert(record.source, [record.serial.as_str()]);
    }
    serials
}
