//! Deletion of Snipe-IT assets: orphans no MDM reports any more, or a full
//! (optionally manufacturer-filtered) wipe. Callers decide on confirmation;
//! nothing here prompts.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::snipe::Asset;
use crate::snipe::SnipeClient;
use crate::verify::AssetIndex;
use crate::verify::SourceSerials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanMode {
    /// List what would be deleted without touching Snipe-IT.
    DryRun,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub asset_id: u64,
    pub serial: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: String,
}

impl Orphan {
    fn from_asset(asset: &Asset) -> Self {
        Self {
            asset_id: asset.id,
            serial: asset.serial().map(str::to_string),
            name: asset.label().to_string(),
            category: asset.category.as_ref().and_then(|category| category.name.clone()),
            manufacturer: asset.manufacturer_name().to_string(),
        }
    }
}

/// Assets whose serial appears in no source. Assets without a serial are
/// never candidates, and an empty source set yields no candidates at all so
/// an MDM outage cannot empty Snipe-IT.
pub fn plan_clean(index: &AssetIndex, sources: &SourceSerials) -> Vec<Orphan> {
    let known = sources.union();
    if known.is_empty() {
        warn!("no serials were reported by any source; refusing to plan deletions");
        return Vec::new();
    }
    index
        .assets()
        .filter(|(serial, _)| !known.contains(*serial))
        .map(|(_, asset)| Orphan::from_asset(asset))
        .collect()
}

/// Every asset, or only those whose manufacturer name contains `manufacturer`
/// (case-insensitive).
pub fn plan_wipe(assets: &[Asset], manufacturer: Option<&str>) -> Vec<Orphan> {
    let needle = manufacturer
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty());
    assets
        .iter()
        .filter(|asset| match &needle {
            Some(needle) => asset.manufacturer_name().to_lowercase().contains(needle),
            None => true,
        })
        .map(Orphan::from_asset)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub planned: usize,
    pub deleted: usize,
    pub failed: Vec<(u64, String)>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl DeletionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

pub async fn execute(
    snipe: &SnipeClient,
    targets: &[Orphan],
    mode: CleanMode,
    cancel: &CancellationToken,
) -> DeletionReport {
    let mut report = DeletionReport {
        planned: targets.len(),
        dry_run: mode == CleanMode::DryRun,
        ..DeletionReport::default()
    };
    if mode == CleanMode::DryRun {
        for target in targets {
            info!(
                "would delete asset {} {} ({})",
                target.asset_id,
                target.name,
                target.serial.as_deref().unwrap_or("no serial")
            );
        }
        return report;
    }

    let total = targets.len();
    for (index, target) in targets.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("deletion cancelled after {index} of {total}");
            report.cancelled = true;
            break;
        }
        let label = target.serial.as_deref().unwrap_or(&target.name);
        match snipe.delete_asset(target.asset_id).await {
            Ok(()) => {
                report.deleted += 1;
                info!("[{}/{total}] deleted {label}", index + 1);
            }
            Err(err) => {
                error!("[{}/{total}] failed to delete {label}: {err}", index + 1);
                report.failed.push((target.asset_id, err.to_string()));
            }
        }
    }
    report
}
