use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::DeviceSource;
use crate::config::IntuneConfig;
use crate::device::DeviceRecord;
use crate::device::DeviceType;
use crate::device::SourceKind;
use crate::device::non_empty;
use crate::error::Result;
use crate::error::SyncErr;
use crate::http::RetryingClient;

const MANAGED_DEVICES_PATH: &str = "/v1.0/deviceManagement/managedDevices";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedDevice {
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    operating_system: Option<String>,
}

impl ManagedDevice {
    fn into_record(self) -> DeviceRecord {
        let device_type = match self.operating_system.as_deref().map(str::to_lowercase) {
            Some(os) if os.contains("ios") || os.contains("ipados") || os.contains("android") => {
                DeviceType::Mobile
            }
            _ => DeviceType::Computer,
        };
        let mut record = DeviceRecord::new(
            self.serial_number.unwrap_or_default(),
            device_type,
            SourceKind::Intune,
        );
        record.name = self.device_name.unwrap_or_default();
        record.model = non_empty(self.model).unwrap_or_else(|| "Unknown".to_string());
        record.email = non_empty(self.email_address).or_else(|| non_empty(self.user_principal_name.clone()));
        record.username = non_empty(self.user_principal_name);
        record
    }
}

#[derive(Debug, Deserialize)]
struct GraphPage {
    #[serde(default)]
    value: Vec<ManagedDevice>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

/// Export files are either a bare array or a saved Graph response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Devices(Vec<ManagedDevice>),
    Page(GraphPage),
}

enum Mode {
    Graph { first_page: String, token: String },
    Export(PathBuf),
}

pub struct IntuneSource {
    http: RetryingClient,
    mode: Mode,
}

impl IntuneSource {
    pub fn new(http: RetryingClient, config: &IntuneConfig) -> Self {
        let mode = match config {
            IntuneConfig::Graph {
                graph_url,
                access_token,
            } => Mode::Graph {
                first_page: format!(
                    "{}{MANAGED_DEVICES_PATH}",
                    graph_url.as_str().trim_end_matches('/')
                ),
                token: access_token.clone(),
            },
            IntuneConfig::ExportFile(path) => Mode::Export(path.clone()),
        };
        Self { http, mode }
    }

    async fn graph_devices(&self, first_page: &str, token: &str) -> Result<Vec<ManagedDevice>> {
        let mut devices = Vec::new();
        let mut next = Some(first_page.to_string());
        while let Some(url) = next {
            let page: GraphPage = self
                .http
                .send_json(|http| http.get(&url).bearer_auth(token))
                .await?;
            debug!(fetched = page.value.len(), "fetched Intune page");
            devices.extend(page.value);
            next = page.next_link;
        }
        Ok(devices)
    }

    async fn export_devices(path: &Path) -> Result<Vec<ManagedDevice>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let parsed: ExportFile = serde_json::from_str(&raw).map_err(|err| SyncErr::Decode {
            url: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(match parsed {
            ExportFile::Devices(devices) => devices,
            ExportFile::Page(page) => page.value,
        })
    }

    async fn managed_devices(&self) -> Result<Vec<ManagedDevice>> {
        match &self.mode {
            Mode::Graph { first_page, token } => self.graph_devices(first_page, token).await,
            Mode::Export(path) => Self::export_devices(path).await,
        }
    }
}

#[async_trait]
impl DeviceSource for IntuneSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Intune
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self
            .managed_devices()
            .await?
            .into_iter()
            .map(ManagedDevice::into_record)
            .collect())
    }

    async fn ping(&self) -> Result<String> {
        match &self.mode {
            Mode::Graph { first_page, token } => {
                let url = format!("{first_page}?$top=1");
                let _: GraphPage = self
                    .http
                    .send_json(|http| http.get(&url).bearer_auth(token))
                    .await?;
                Ok("Graph reachable".to_string())
            }
            Mode::Export(path) => {
                let devices = Self::export_devices(path).await?;
                Ok(format!("{} devices in {}", devices.len(), path.display()))
            }
        }
    }
}
