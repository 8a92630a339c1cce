use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::DeviceSource;
use crate::config::KandjiConfig;
use crate::device::DeviceRecord;
use crate::device::DeviceType;
use crate::device::SourceKind;
use crate::device::non_empty;
use crate::error::Result;
use crate::http::RetryingClient;

const PAGE_SIZE: usize = 300;

#[derive(Debug, Deserialize)]
struct KandjiDevice {
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    blueprint_name: Option<String>,
    /// An object with `email`/`name`, or an empty string when unassigned.
    #[serde(default)]
    user: Value,
}

impl KandjiDevice {
    fn into_record(self) -> DeviceRecord {
        let device_type = match self.platform.as_deref() {
            Some(platform) if platform.eq_ignore_ascii_case("mac") => DeviceType::Computer,
            Some(_) => DeviceType::Mobile,
            None => DeviceType::Computer,
        };
        let mut record = DeviceRecord::new(
            self.serial_number.unwrap_or_default(),
            device_type,
            SourceKind::Kandji,
        );
        record.name = self.device_name.unwrap_or_default();
        record.model = non_empty(self.model).unwrap_or_else(|| "Unknown".to_string());
        record.prestage_name = non_empty(self.blueprint_name);
        let user_field = |key: &str| {
            non_empty(
                self.user
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            )
        };
        record.email = user_field("email");
        record.username = user_field("name");
        record
    }
}

pub struct KandjiSource {
    http: RetryingClient,
    base: String,
    token: String,
    blueprint_id: Option<String>,
}

impl KandjiSource {
    pub fn new(http: RetryingClient, config: &KandjiConfig) -> Self {
        Self {
            http,
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            blueprint_id: config.blueprint_id.clone(),
        }
    }

    async fn page(&self, limit: usize, offset: usize) -> Result<Vec<KandjiDevice>> {
        let url = format!("{}/api/v1/devices", self.base);
        let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if let Some(blueprint_id) = &self.blueprint_id {
            query.push(("blueprint_id", blueprint_id.clone()));
        }
        self.http
            .send_json(|http| {
                http.get(&url)
                    .bearer_auth(&self.token)
                    .header("Accept", "application/json")
                    .query(&query)
            })
            .await
    }
}

#[async_trait]
impl DeviceSource for KandjiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Kandji
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut devices = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.page(PAGE_SIZE, offset).await?;
            let fetched = page.len();
            devices.extend(page.into_iter().map(KandjiDevice::into_record));
            debug!(offset, fetched, "fetched Kandji page");
            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }
        Ok(devices)
    }

    async fn ping(&self) -> Result<String> {
        let page = self.page(1, 0).await?;
        Ok(if page.is_empty() {
            "reachable, no devices".to_string()
        } else {
            "reachable".to_string()
        })
    }
}
