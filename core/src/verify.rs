//! Set comparison between MDM serials and Snipe-IT assets.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::device::SourceKind;
use crate::error::Result;
use crate::snipe::Asset;

/// Serials are compared trimmed and upper-cased.
pub fn normalize_serial(serial: &str) -> String {
    serial.trim().to_uppercase()
}

/// Serials reported by each MDM, plus their union.
#[derive(Debug, Clone, Default)]
pub struct SourceSerials {
    per_source: BTreeMap<SourceKind, BTreeSet<String>>,
}

impl SourceSerials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, kind: SourceKind, serials: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.per_source.entry(kind).or_default();
        entry.extend(
            serials
                .into_iter()
                .map(|serial| normalize_serial(serial.as_ref()))
                .filter(|serial| !serial.is_empty()),
        );
    }

    pub fn union(&self) -> BTreeSet<String> {
        self.per_source.values().flatten().cloned().collect()
    }

    pub fn sources(&self) -> impl Iterator<Item = (SourceKind, &BTreeSet<String>)> {
        self.per_source.iter().map(|(kind, serials)| (*kind, serials))
    }
}

/// Snipe-IT assets keyed by normalized serial. Assets without a serial are
/// counted but never indexed.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    by_serial: BTreeMap<String, Asset>,
    without_serial: Vec<Asset>,
}

impl AssetIndex {
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut index = Self::default();
        for asset in assets {
            match asset.serial().map(normalize_serial) {
                Some(serial) => {
                    index.by_serial.insert(serial, asset);
                }
                None => index.without_serial.push(asset),
            }
        }
        index
    }

    pub fn serials(&self) -> BTreeSet<String> {
        self.by_serial.keys().cloned().collect()
    }

    pub fn assets(&self) -> impl Iterator<Item = (&String, &Asset)> {
        self.by_serial.iter()
    }

    pub fn len(&self) -> usize {
        self.by_serial.len() + self.without_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn assigned_count(&self) -> usize {
        self.by_serial
            .values()
            .chain(self.without_serial.iter())
            .filter(|asset| asset.assigned_to.is_some())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncHealth {
    Perfect,
    Good,
    NeedsAttention,
    Critical,
}

impl SyncHealth {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 100.0 {
            SyncHealth::Perfect
        } else if accuracy >= 95.0 {
            SyncHealth::Good
        } else if accuracy >= 90.0 {
            SyncHealth::NeedsAttention
        } else {
            SyncHealth::Critical
        }
    }
}

impl fmt::Display for SyncHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyncHealth::Perfect => "PERFECT (100%)",
            SyncHealth::Good => "GOOD (>=95%)",
            SyncHealth::NeedsAttention => "NEEDS ATTENTION (>=90%)",
            SyncHealth::Critical => "CRITICAL (<90%)",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCoverage {
    pub source: SourceKind,
    pub total: usize,
    pub found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub source_total: usize,
    pub target_total: usize,
    pub found: usize,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub accuracy: f64,
    pub assigned: usize,
    pub assignment_coverage: f64,
    pub per_source: Vec<SourceCoverage>,
}

impl VerifyReport {
    pub fn health(&self) -> SyncHealth {
        SyncHealth::from_accuracy(self.accuracy)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.source_total > 0
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Pure set arithmetic; an empty source set yields 0% accuracy.
pub fn compare(sources: &SourceSerials, index: &AssetIndex) -> VerifyReport {
    let source = sources.union();
    let target = index.serials();

    let found = source.intersection(&target).count();
    let missing: Vec<String> = source.difference(&target).cloned().collect();
    let extra: Vec<String> = target.difference(&source).cloned().collect();
    let assigned = index.assigned_count();

    let per_source = sources
        .sources()
        .map(|(kind, serials)| SourceCoverage {
            source: kind,
            total: serials.len(),
            found: serials.intersection(&target).count(),
        })
        .collect();

    VerifyReport {
        source_total: source.len(),
        target_total: index.len(),
        found,
        missing,
        extra,
        accuracy: percent(found, source.len()),
        assigned,
        assignment_coverage: percent(assigned, index.len()),
        per_source,
    }
}

/// Writes the missing serials to `path`; the format follows the extension
/// (`.json` array, `.csv` with a header row, anything else one per line).
pub fn export_missing(path: &Path, missing: &[String]) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let contents = match extension.as_deref() {
        Some("json") => serde_json::to_string_pretty(missing)?,
        Some("csv") => {
            let mut out = String::from("serial\n");
            for serial in missing {
                out.push_str(serial);
                out.push('\n');
            }
            out
        }
        _ => missing.iter().map(|serial| format!("{serial}\n")).collect(),
    };
    std::fs::write(path, contents)?;
    Ok(())
}
