use serde::Serialize;

use crate::reconcile::CheckoutStatus;
use crate::reconcile::Outcome;
use crate::reconcile::PlannedAction;
use crate::reconcile::RecordReport;

/// Tally of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub planned_creates: usize,
    pub planned_updates: usize,
    pub failed: usize,
    pub skipped: usize,
    pub users_mapped: usize,
    pub users_not_found: usize,
    pub checkout_failures: usize,
    pub api_calls: u64,
    pub retries: u64,
    pub cancelled: bool,
    pub failed_serials: Vec<String>,
}

impl SyncSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, report: &RecordReport) {
        match &report.outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::Planned {
                action: PlannedAction::Create,
                ..
            } => self.planned_creates += 1,
            Outcome::Planned {
                action: PlannedAction::Update,
                ..
            } => self.planned_updates += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => {
                self.failed += 1;
                self.failed_serials.push(report.serial.clone());
            }
        }
        match report.checkout {
            CheckoutStatus::Assigned { .. } => self.users_mapped += 1,
            CheckoutStatus::NoUser => self.users_not_found += 1,
            CheckoutStatus::Failed { .. } => self.checkout_failures += 1,
            CheckoutStatus::NoEmail | CheckoutStatus::NotAttempted => {}
        }
    }

    pub fn processed(&self) -> usize {
        self.created
            + self.updated
            + self.planned_creates
            + self.planned_updates
            + self.failed
            + self.skipped
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.planned_creates + self.planned_updates
    }

    /// Share of processable records (those with a serial) that were written
    /// or planned, in percent.
    pub fn success_rate(&self) -> f64 {
        let processable = self.processed() - self.skipped;
        if processable == 0 {
            return 0.0;
        }
        self.succeeded() as f64 / processable as f64 * 100.0
    }

    /// Whether the run should exit with status 0.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && !self.cancelled
    }

    pub fn render_table(&self) -> String {
        let mut rows = vec![("Devices", self.total.to_string())];
        if self.planned_creates + self.planned_updates > 0 {
            rows.push(("Would create", self.planned_creates.to_string()));
            rows.push(("Would update", self.planned_updates.to_string()));
        } else {
            rows.push(("Created", self.created.to_string()));
            rows.push(("Updated", self.updated.to_string()));
        }
        rows.extend([
            ("Failed", self.failed.to_string()),
            ("Skipped (no serial)", self.skipped.to_string()),
            ("Users assigned", self.users_mapped.to_string()),
            ("Users not found", self.users_not_found.to_string()),
            ("Checkout failures", self.checkout_failures.to_string()),
            ("API calls", self.api_calls.to_string()),
            ("Retries", self.retries.to_string()),
            ("Success rate", format!("{:.1}%", self.success_rate())),
        ]);
        if self.cancelled {
            rows.push(("Status", "cancelled".to_string()));
        }

        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        let mut out = String::new();
        for (label, value) in rows {
            out.push_str(&format!("{label:<width$}  {value}\n"));
        }
        if !self.failed_serials.is_empty() {
            out.push_str(&format!("Failed serials: {}\n", self.failed_serials.join(", ")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(serial: &str, outcome: Outcome, checkout: CheckoutStatus) -> RecordReport {
        RecordReport {
            serial: serial.to_string(),
            name: serial.to_string(),
            category: None,
            outcome,
            checkout,
        }
    }

    #[test]
    fn tallies_outcomes_and_checkouts() {
        let mut summary = SyncSummary::new(4);
        summary.record(&report(
            "A",
            Outcome::Created { asset_id: 1 },
            CheckoutStatus::Assigned { user_id: 3 },
        ));
        summary.record(&report(
            "B",
            Outcome::Updated { asset_id: 2 },
            CheckoutStatus::Failed {
                reason: "locked".to_string(),
            },
        ));
        summary.record(&report(
            "C",
            Outcome::Failed {
                reason: "model".to_string(),
            },
            CheckoutStatus::NotAttempted,
        ));
        summary.record(&report(
            "",
            Outcome::Skipped {
                reason: "missing serial number".to_string(),
            },
            CheckoutStatus::NotAttempted,
        ));

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.users_mapped, 1);
        assert_eq!(summary.checkout_failures, 1);
        assert_eq!(summary.failed_serials, vec!["C".to_string()]);
        assert!((summary.success_rate() - 200.0 / 3.0).abs() < 1e-9);
        assert!(!summary.is_success());
    }

    #[test]
    fn checkout_failure_alone_is_still_success() {
        let mut summary = SyncSummary::new(1);
        summary.record(&report(
            "A",
            Outcome::Created { asset_id: 1 },
            CheckoutStatus::Failed {
                reason: "500".to_string(),
            },
        ));
        assert!(summary.is_success());
        let table = summary.render_table();
        let rate_line = table
            .lines()
            .find(|line| line.starts_with("Success rate"))
            .unwrap();
        assert!(rate_line.ends_with("100.0%"));
    }

    #[test]
    fn cancellation_fails_the_run() {
        let summary = SyncSummary {
            cancelled: true,
            ..SyncSummary::new(0)
        };
        assert!(!summary.is_success());
    }
}
