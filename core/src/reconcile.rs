//! Per-device create-or-update against Snipe-IT.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::category::Category;
use crate::category::classify_record;
use crate::device::DeviceRecord;
use crate::resolver::Resolver;
use crate::resolver::model_name;
use crate::snipe::AssetPayload;
use crate::snipe::CheckoutRequest;
use crate::snipe::SnipeClient;
use crate::summary::SyncSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created { asset_id: u64 },
    Updated { asset_id: u64 },
    /// Dry run: what would have been written. `model_id` is `None` when the
    /// model does not exist yet and would be created.
    Planned {
        action: PlannedAction,
        model_id: Option<u64>,
    },
    /// Not processable; no API call was made.
    Skipped { reason: String },
    Failed { reason: String },
}

impl Outcome {
    pub fn asset_id(&self) -> Option<u64> {
        match self {
            Outcome::Created { asset_id } | Outcome::Updated { asset_id } => Some(*asset_id),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Assigned { user_id: u64 },
    /// The record had an email but no Snipe-IT user matched it.
    NoUser,
    NoEmail,
    /// The asset was written but the checkout call failed.
    Failed { reason: String },
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub serial: String,
    pub name: String,
    pub category: Option<Category>,
    pub outcome: Outcome,
    pub checkout: CheckoutStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub status_id: u64,
    /// Records per batch; the pause below is taken between batches.
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            status_id: crate::config::DEFAULT_STATUS_ID,
            batch_size: 100,
            batch_delay: Duration::from_secs(10),
            dry_run: false,
        }
    }
}

/// Text stored in the asset's notes field.
pub fn sync_notes(record: &DeviceRecord, synced_at: &str) -> String {
    format!(
        "Prestage: {} | Source: {} | Synced: {synced_at}",
        record.prestage_name.as_deref().unwrap_or("None"),
        record.source,
    )
}

pub struct Reconciler {
    snipe: SnipeClient,
    resolver: Resolver,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(snipe: SnipeClient, resolver: Resolver, options: ReconcileOptions) -> Self {
        Self {
            snipe,
            resolver,
            options,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Reconciles one device. Never returns an error: failures are folded
    /// into the report so one device cannot abort a batch.
    pub async fn reconcile(&self, record: &DeviceRecord) -> RecordReport {
        let mut report = RecordReport {
            serial: record.serial.clone(),
            name: record.display_name().to_string(),
            category: None,
            outcome: Outcome::Skipped {
                reason: "missing serial number".to_string(),
            },
            checkout: CheckoutStatus::NotAttempted,
        };
        if !record.has_serial() {
            warn!(name = %record.name, source = %record.source, "skipping device without serial");
            return report;
        }

        let category = classify_record(record).category;
        report.category = Some(category);

        if self.options.dry_run {
            report.outcome = self.plan(record, category).await;
            return report;
        }

        let Some(model_id) = self.resolver.resolve_model(&record.model, category).await else {
            report.outcome = Outcome::Failed {
                reason: format!("could not resolve model for {:?}", record.model),
            };
            return report;
        };

        let synced_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let payload = AssetPayload {
            asset_tag: record.serial.clone(),
            serial: record.serial.clone(),
            name: record.display_name().to_string(),
            model_id,
            category_id: category.id(),
            status_id: self.options.status_id,
            notes: sync_notes(record, &synced_at),
        };

        let existing = match self.snipe.find_by_serial(&record.serial).await {
            Ok(existing) => existing,
            Err(err) => {
                report.outcome = Outcome::Failed {
                    reason: format!("serial lookup failed: {err}"),
                };
                return report;
            }
        };

        let write = match existing {
            Some(asset) => self
                .snipe
                .update_asset(asset.id, &payload)
                .await
                .map(|()| Outcome::Updated { asset_id: asset.id }),
            None => self
                .snipe
                .create_asset(&payload)
                .await
                .map(|asset_id| Outcome::Created { asset_id }),
        };
        report.outcome = match write {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Failed {
                reason: err.to_string(),
            },
        };

        if let Some(asset_id) = report.outcome.asset_id() {
            report.checkout = self.checkout(record, asset_id).await;
        }
        report
    }

    async fn plan(&self, record: &DeviceRecord, category: Category) -> Outcome {
        let model_id = self.resolver.find_model(&record.model, category).await;
        if model_id.is_none() {
            info!(
                serial = %record.serial,
                "would create model {}",
                model_name(&record.model, category)
            );
        }
        match self.snipe.find_by_serial(&record.serial).await {
            Ok(Some(_)) => Outcome::Planned {
                action: PlannedAction::Update,
                model_id,
            },
            Ok(None) => Outcome::Planned {
                action: PlannedAction::Create,
                model_id,
            },
            Err(err) => Outcome::Failed {
                reason: format!("serial lookup failed: {err}"),
            },
        }
    }

    async fn checkout(&self, record: &DeviceRecord, asset_id: u64) -> CheckoutStatus {
        let Some(email) = record.email.as_deref().filter(|email| !email.trim().is_empty()) else {
            return CheckoutStatus::NoEmail;
        };
        let Some(user_id) = self.resolver.resolve_user(email).await else {
            return CheckoutStatus::NoUser;
        };
        let request = CheckoutRequest::to_user(user_id, format!("Auto-assigned from {}", record.source));
        match self.snipe.checkout(asset_id, &request).await {
            Ok(()) => CheckoutStatus::Assigned { user_id },
            Err(err) => {
                warn!(serial = %record.serial, user_id, "checkout failed: {err}");
                CheckoutStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Reconciles records in order, pausing between batches. Cancellation is
    /// checked between records, so the device in flight always completes.
    pub async fn run(&self, records: &[DeviceRecord], cancel: &CancellationToken) -> SyncSummary {
        let mut summary = SyncSummary::new(records.len());
        let batch_size = self.options.batch_size.max(1);
        let total = records.len();

        'batches: for (batch_index, batch) in records.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.options.batch_delay.is_zero() {
                info!("batch {batch_index} done, pausing {:?}", self.options.batch_delay);
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.options.batch_delay) => {}
                }
            }
            for (offset, record) in batch.iter().enumerate() {
                if cancel.is_cancelled() {
                    warn!("sync cancelled, stopping before {}", record.serial);
                    summary.cancelled = true;
                    break 'batches;
                }
                let position = batch_index * batch_size + offset + 1;
                let report = self.reconcile(record).await;
                log_progress(position, total, &report);
                summary.record(&report);
            }
        }

        let stats = self.snipe.http().stats();
        summary.api_calls = stats.calls();
        summary.retries = stats.retries();
        summary
    }
}

fn log_progress(position: usize, total: usize, report: &RecordReport) {
    let category = report.category.map(Category::name).unwrap_or("-");
    match &report.outcome {
        Outcome::Created { asset_id } => info!(
            "[{position}/{total}] created {} ({}) as asset {asset_id} in {category}",
            report.name, report.serial
        ),
        Outcome::Updated { asset_id } => info!(
            "[{position}/{total}] updated {} ({}) asset {asset_id} in {category}",
            report.name, report.serial
        ),
        Outcome::Planned { action, .. } => info!(
            "[{position}/{total}] would {action:?} {} ({}) in {category}",
            report.name, report.serial
        ),
        Outcome::Skipped { reason } => {
            warn!("[{position}/{total}] skipped {}: {reason}", report.name)
        }
        Outcome::Failed { reason } => error!(
            "[{position}/{total}] failed {} ({}): {reason}",
            report.name, report.serial
        ),
    }
}
