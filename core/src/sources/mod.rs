//! MDM device sources.

mod intune;
mod jamf;
mod kandji;

pub use intune::IntuneSource;
pub use jamf::JamfSource;
pub use kandji::KandjiSource;

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::device::DeviceRecord;
use crate::device::SourceKind;
use crate::error::Result;
use crate::error::SyncErr;
use crate::http::RetryingClient;
use crate::verify::SourceSerials;
use crate::verify::normalize_serial;

#[async_trait]
pub trait DeviceSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Every device the MDM reports, normalised into [`DeviceRecord`]s.
    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>>;

    /// Serial numbers only. Sources that can list serials more cheaply than
    /// full records override this.
    async fn fetch_serials(&self) -> Result<Vec<String>> {
        let devices = self.fetch_devices().await?;
        Ok(devices
            .into_iter()
            .filter(DeviceRecord::has_serial)
            .map(|device| device.serial)
            .collect())
    }

    /// Authenticates and makes one cheap call; returns a short description
    /// of what was reached.
    async fn ping(&self) -> Result<String>;
}

/// Builds the configured sources, restricted to `only` when it is non-empty.
pub fn build_sources(
    config: &Config,
    http: &RetryingClient,
    only: &[SourceKind],
) -> Result<Vec<Box<dyn DeviceSource>>> {
    if !config.has_any_source() {
        return Err(SyncErr::NoSources);
    }
    let wanted = |kind: SourceKind| only.is_empty() || only.contains(&kind);
    let mut sources: Vec<Box<dyn DeviceSource>> = Vec::new();

    for kind in SourceKind::ALL {
        if !wanted(kind) {
            continue;
        }
        let source: Option<Box<dyn DeviceSource>> = match kind {
            SourceKind::Jamf => config.jamf.as_ref().map(|jamf| {
                Box::new(JamfSource::new(
                    http.clone(),
                    jamf,
                    config.rate_limit.detail_workers,
                )) as Box<dyn DeviceSource>
            }),
            SourceKind::Kandji => config
                .kandji
                .as_ref()
                .map(|kandji| Box::new(KandjiSource::new(http.clone(), kandji)) as Box<dyn DeviceSource>),
            SourceKind::Intune => config
                .intune
                .as_ref()
                .map(|intune| Box::new(IntuneSource::new(http.clone(), intune)) as Box<dyn DeviceSource>),
        };
        match source {
            Some(source) => sources.push(source),
            None if !only.is_empty() => return Err(SyncErr::SourceNotConfigured(kind)),
            None => {}
        }
    }
    Ok(sources)
}

/// Devices from every source, first occurrence of a serial winning.
/// Serial-less records are kept so the reconciler can report them.
pub async fn fetch_all(sources: &[Box<dyn DeviceSource>]) -> Result<Vec<DeviceRecord>> {
    let mut seen = HashSet::new();
    let mut devices = Vec::new();
    for source in sources {
        let fetched = source.fetch_devices().await?;
        info!("{} reported {} devices", source.kind(), fetched.len());
        for device in fetched {
            if device.has_serial() && !seen.insert(normalize_serial(&device.serial)) {
                warn!(
                    serial = %device.serial,
                    source = %device.source,
                    "duplicate serial across sources, keeping the first record"
                );
                continue;
            }
            devices.push(device);
        }
    }
    Ok(devices)
}

pub async fn collect_serials(sources: &[Box<dyn DeviceSource>]) -> Result<SourceSerials> {
    let mut serials = SourceSerials::new();
    for source in sources {
        let fetched = source.fetch_serials().await?;
        info!("{} reported {} serials", source.kind(), fetched.len());
        serials.insert(source.kind(), fetched);
    }
    Ok(serials)
}
