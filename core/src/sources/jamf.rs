use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DeviceSource;
use crate::config::JamfConfig;
use crate::device::DeviceRecord;
use crate::device::DeviceType;
use crate::device::SourceKind;
use crate::device::non_empty;
use crate::error::Result;
use crate::error::SyncErr;
use crate::http::RetryingClient;

const PAGE_SIZE: usize = 200;
const UNKNOWN_MAC: &str = "Unknown Mac";
const UNKNOWN_MOBILE: &str = "Unknown Mobile Device";

/// Jamf ids come back as strings from some endpoints and numbers from others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn as_string(&self) -> String {
        match self {
            RawId::Text(text) => text.clone(),
            RawId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryPage<T> {
    #[serde(default)]
    total_count: usize,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerGeneral {
    name: Option<String>,
    enrollment_method: Option<EnrollmentMethod>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollmentMethod {
    object_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerHardware {
    model: Option<String>,
    serial_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAndLocation {
    email: Option<String>,
    username: Option<String>,
    realname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Computer {
    id: RawId,
    #[serde(default)]
    general: ComputerGeneral,
    #[serde(default)]
    hardware: ComputerHardware,
    #[serde(default)]
    user_and_location: UserAndLocation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileSummary {
    id: RawId,
    name: Option<String>,
    serial_number: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileLocation {
    email_address: Option<String>,
    username: Option<String>,
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileDetail {
    name: Option<String>,
    serial_number: Option<String>,
    model: Option<String>,
    /// Either a bare prestage name or an object carrying `objectName`.
    #[serde(default)]
    enrollment_method: Option<serde_json::Value>,
    #[serde(default)]
    location: MobileLocation,
}

fn enrollment_name(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(name) => non_empty(Some(name.clone())),
        serde_json::Value::Object(fields) => non_empty(
            fields
                .get("objectName")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        ),
        _ => None,
    }
}

pub struct JamfSource {
    http: RetryingClient,
    base: String,
    client_id: String,
    client_secret: String,
    token: OnceCell<String>,
    detail_workers: usize,
}

impl JamfSource {
    pub fn new(http: RetryingClient, config: &JamfConfig, detail_workers: usize) -> Self {
        Self {
            http,
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: OnceCell::new(),
            detail_workers: detail_workers.clamp(1, 8),
        }
    }

    /// OAuth client-credentials token, fetched once per source.
    async fn token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let url = format!("{}/api/oauth/token", self.base);
                let form = [
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                    ("grant_type", "client_credentials"),
                ];
                let response: TokenResponse = self
                    .http
                    .send_json(|http| http.post(&url).form(&form))
                    .await
                    .map_err(|err| SyncErr::Auth {
                        service: "Jamf",
                        reason: err.to_string(),
                    })?;
                debug!("obtained Jamf access token");
                Ok::<_, SyncErr>(response.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.token().await?;
        let url = format!("{}{path}", self.base);
        self.http
            .send_json(|http| {
                http.get(&url)
                    .bearer_auth(token)
                    .header("Accept", "application/json")
                    .query(query)
            })
            .await
    }

    async fn paged<T: DeserializeOwned>(&self, path: &str, extra: &[(&str, String)]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 0usize;
        loop {
            let mut query = vec![("page", page.to_string()), ("page-size", PAGE_SIZE.to_string())];
            query.extend(extra.iter().cloned());
            let response: InventoryPage<T> = self.get(path, &query).await?;
            let fetched = response.results.len();
            items.extend(response.results);
            debug!(path, page, fetched, total = response.total_count, "fetched Jamf page");
            if fetched < PAGE_SIZE || items.len() >= response.total_count {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn computers(&self) -> Result<Vec<Computer>> {
        self.paged(
            "/api/v1/computers-inventory",
            &[
                ("section", "GENERAL".to_string()),
                ("section", "HARDWARE".to_string()),
            ],
        )
        .await
    }

    async fn mobile_devices(&self) -> Result<Vec<MobileSummary>> {
        self.paged("/api/v2/mobile-devices", &[]).await
    }

    async fn computer_record(&self, summary: Computer) -> DeviceRecord {
        let id = summary.id.as_string();
        let detail = self
            .get::<Computer>(&format!("/api/v1/computers-inventory-detail/{id}"), &[])
            .await;
        let computer = match detail {
            Ok(detail) => detail,
            Err(err) => {
                warn!(id = %id, "computer detail unavailable, using inventory row: {err}");
                summary
            }
        };
        computer_to_record(computer)
    }

    async fn mobile_record(&self, summary: MobileSummary) -> DeviceRecord {
        let id = summary.id.as_string();
        match self
            .get::<MobileDetail>(&format!("/api/v2/mobile-devices/{id}/detail"), &[])
            .await
        {
            Ok(detail) => mobile_detail_to_record(detail, &summary),
            Err(err) => {
                warn!(id = %id, "mobile device detail unavailable, using inventory row: {err}");
                mobile_summary_to_record(summary)
            }
        }
    }
}

fn computer_to_record(computer: Computer) -> DeviceRecord {
    let serial = non_empty(computer.hardware.serial_number)
        .or_else(|| non_empty(computer.general.name.clone()))
        .unwrap_or_default();
    let mut record = DeviceRecord::new(serial, DeviceType::Computer, SourceKind::Jamf);
    record.name = computer.general.name.unwrap_or_default();
    record.model = non_empty(computer.hardware.model).unwrap_or_else(|| UNKNOWN_MAC.to_string());
    record.prestage_name = computer
        .general
        .enrollment_method
        .and_then(|method| non_empty(method.object_name));
    record.email = non_empty(computer.user_and_location.email);
    record.username = non_empty(computer.user_and_location.username)
        .or_else(|| non_empty(computer.user_and_location.realname));
    record
}

fn mobile_summary_to_record(summary: MobileSummary) -> DeviceRecord {
    let mut record = DeviceRecord::new(
        summary.serial_number.unwrap_or_default(),
        DeviceType::Mobile,
        SourceKind::Jamf,
    );
    record.name = summary.name.unwrap_or_default();
    record.model = non_empty(summary.model).unwrap_or_else(|| UNKNOWN_MOBILE.to_string());
    record
}

fn mobile_detail_to_record(detail: MobileDetail, summary: &MobileSummary) -> DeviceRecord {
    let serial = non_empty(detail.serial_number)
        .or_else(|| non_empty(summary.serial_number.clone()))
        .unwrap_or_default();
    let mut record = DeviceRecord::new(serial, DeviceType::Mobile, SourceKind::Jamf);
    record.name = non_empty(detail.name)
        .or_else(|| non_empty(summary.name.clone()))
        .unwrap_or_default();
    record.model = non_empty(detail.model)
        .or_else(|| non_empty(summary.model.clone()))
        .unwrap_or_else(|| UNKNOWN_MOBILE.to_string());
    record.prestage_name = enrollment_name(detail.enrollment_method.as_ref());
    record.email = non_empty(detail.location.email_address);
    record.username =
        non_empty(detail.location.username).or_else(|| non_empty(detail.location.real_name));
    record
}

#[async_trait]
impl DeviceSource for JamfSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Jamf
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>> {
        let computers = self.computers().await?;
        info!("Jamf inventory lists {} computers", computers.len());
        let mut devices: Vec<DeviceRecord> = stream::iter(computers)
            .map(|computer| self.computer_record(computer))
            .buffer_unordered(self.detail_workers)
            .collect()
            .await;

        let mobiles = self.mobile_devices().await?;
        info!("Jamf inventory lists {} mobile devices", mobiles.len());
        let mobile_records: Vec<DeviceRecord> = stream::iter(mobiles)
            .map(|mobile| self.mobile_record(mobile))
            .buffer_unordered(self.detail_workers)
            .collect()
            .await;
        devices.extend(mobile_records);
        Ok(devices)
    }

    async fn fetch_serials(&self) -> Result<Vec<String>> {
        let mut serials: Vec<String> = self
            .computers()
            .await?
            .into_iter()
            .filter_map(|computer| {
                non_empty(computer.hardware.serial_number).or_else(|| non_empty(computer.general.name))
            })
            .collect();
        serials.extend(
            self.mobile_devices()
                .await?
                .into_iter()
                .filter_map(|mobile| non_empty(mobile.serial_number)),
        );
        Ok(serials)
    }

    async fn ping(&self) -> Result<String> {
        let page: InventoryPage<serde_json::Value> = self
            .get(
                "/api/v1/computers-inventory",
                &[("page", "0".to_string()), ("page-size", "1".to_string())],
            )
            .await?;
        Ok(format!("{} computers", page.total_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RetryPolicy;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_string_contains;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    fn source(server: &MockServer) -> JamfSource {
        let config = JamfConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        JamfSource::new(RetryingClient::new(RetryPolicy::immediate()).unwrap(), &config, 2)
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "jamf-token", "expires_in": 1200})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn merges_inventory_with_detail() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/computers-inventory"))
            .and(header("Authorization", "Bearer jamf-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalCount": 2,
                "results": [
                    {"id": "1", "general": {"name": "Lab-01"}, "hardware": {"serialNumber": "C02AAA"}},
                    {"id": "2", "general": {"name": "Lab-02"}, "hardware": {"serialNumber": "C02BBB"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/computers-inventory-detail/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1",
                "general": {
                    "name": "Lab-01",
                    "enrollmentMethod": {"objectName": "Student Loaners"}
                },
                "hardware": {"serialNumber": "C02AAA", "model": "MacBook Air (M2)"},
                "userAndLocation": {"email": "kid@student.school.org", "username": "kid"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/computers-inventory-detail/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mobile-devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalCount": 1,
                "results": [{"id": 7, "name": "Front Desk", "serialNumber": "DMPXYZ", "model": "iPad"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mobile-devices/7/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "serialNumber": "DMPXYZ",
                "name": "Front Desk",
                "model": "iPad (9th generation)",
                "enrollmentMethod": "Kiosk iPads",
                "location": {"emailAddress": "desk@school.org"}
            })))
            .mount(&server)
            .await;

        let mut devices = source(&server).fetch_devices().await.unwrap();
        devices.sort_by(|a, b| a.serial.cmp(&b.serial));

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "C02AAA");
        assert_eq!(devices[0].prestage_name.as_deref(), Some("Student Loaners"));
        assert_eq!(devices[0].email.as_deref(), Some("kid@student.school.org"));
        assert_eq!(devices[0].model, "MacBook Air (M2)");
        assert_eq!(devices[1].serial, "C02BBB");
        assert_eq!(devices[1].model, UNKNOWN_MAC);
        assert_eq!(devices[2].device_type, DeviceType::Mobile);
        assert_eq!(devices[2].prestage_name.as_deref(), Some("Kiosk iPads"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = source(&server).fetch_serials().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn computer_serial_falls_back_to_name() {
        let computer: Computer = serde_json::from_value(json!({
            "id": 3,
            "general": {"name": "C02NAME"}
        }))
        .unwrap();
        let record = computer_to_record(computer);
        assert_eq!(record.serial, "C02NAME");
        assert_eq!(record.model, UNKNOWN_MAC);
    }
}
