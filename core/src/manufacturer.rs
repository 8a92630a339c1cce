//! Repair of Apple models that were created under the wrong manufacturer.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::clean::CleanMode;
use crate::snipe::Model;
use crate::snipe::SnipeClient;

/// Lower-case fragments that mark a model name as Apple hardware.
pub const APPLE_MODEL_TERMS: &[&str] = &[
    "ipad",
    "macbook",
    "imac",
    "mac mini",
    "mac studio",
    "apple tv",
    "appletv",
];

pub fn is_apple_model(name: &str) -> bool {
    let name = name.to_lowercase();
    APPLE_MODEL_TERMS.iter().any(|term| name.contains(term))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManufacturerFix {
    pub model_id: u64,
    pub model_name: String,
    pub current_manufacturer_id: Option<u64>,
    pub current_manufacturer: Option<String>,
}

/// Apple models not already under `target_id`. With `from_id`, only models
/// currently under that manufacturer are selected.
pub fn plan_manufacturer_fix(
    models: &[Model],
    target_id: u64,
    from_id: Option<u64>,
) -> Vec<ManufacturerFix> {
    models
        .iter()
        .filter(|model| is_apple_model(&model.name))
        .filter(|model| {
            let current = model.manufacturer.as_ref().map(|manufacturer| manufacturer.id);
            match from_id {
                Some(from_id) => current == Some(from_id),
                None => current != Some(target_id),
            }
        })
        .map(|model| ManufacturerFix {
            model_id: model.id,
            model_name: model.name.clone(),
            current_manufacturer_id: model.manufacturer.as_ref().map(|m| m.id),
            current_manufacturer: model.manufacturer.as_ref().and_then(|m| m.name.clone()),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub planned: usize,
    pub updated: usize,
    pub failed: Vec<(u64, String)>,
    pub cancelled: bool,
}

impl FixReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Re-points each model at `target_id`, stopping between models once `cancel`
/// fires.
pub async fn apply_manufacturer_fix(
    snipe: &SnipeClient,
    fixes: &[ManufacturerFix],
    target_id: u64,
    mode: CleanMode,
    cancel: &CancellationToken,
) -> FixReport {
    let mut report = FixReport {
        planned: fixes.len(),
        ..FixReport::default()
    };
    for (index, fix) in fixes.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("manufacturer fix cancelled after {index} of {}", fixes.len());
            report.cancelled = true;
            break;
        }
        if mode == CleanMode::DryRun {
            info!(
                "would move model {} ({}) to manufacturer {target_id}",
                fix.model_name, fix.model_id
            );
            continue;
        }
        match snipe.update_model_manufacturer(fix.model_id, target_id).await {
            Ok(()) => {
                report.updated += 1;
                info!("moved model {} to manufacturer {target_id}", fix.model_name);
            }
            Err(err) => {
                error!("failed to update model {}: {err}", fix.model_name);
                report.failed.push((fix.model_id, err.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snipe::NamedRef;
    use pretty_assertions::assert_eq;

    fn model(id: u64, name: &str, manufacturer_id: u64) -> Model {
        Model {
            id,
            name: name.to_string(),
            category: None,
            manufacturer: Some(NamedRef {
                id: manufacturer_id,
                name: None,
            }),
        }
    }

    #[test]
    fn selects_apple_models_under_other_manufacturers() {
        let models = vec![
            model(1, "MacBook Air (Student)", 1),
            model(2, "iPad Pro (Teacher)", 9),
            model(3, "ThinkPad T14 (Staff)", 1),
            model(4, "Apple TV 4K (AppleTV)", 4),
        ];
        let ids: Vec<u64> = plan_manufacturer_fix(&models, 9, None)
            .iter()
            .map(|fix| fix.model_id)
            .collect();
        assert_eq!(ids, vec![1, 4]);

        let only_lenovo: Vec<u64> = plan_manufacturer_fix(&models, 9, Some(1))
            .iter()
            .map(|fix| fix.model_id)
            .collect();
        assert_eq!(only_lenovo, vec![1]);
    }

    #[test]
    fn recognises_apple_names() {
        assert!(is_apple_model("Mac mini (M2)"));
        assert!(!is_apple_model("Surface Laptop"));
    }
}
