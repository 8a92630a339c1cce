#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Test helpers shared by the `snipesync-core` integration tests: an
//! in-memory Snipe-IT behind a `wiremock` server.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use snipesync_core::config::SnipeConfig;
use snipesync_core::device::DeviceRecord;
use snipesync_core::device::DeviceType;
use snipesync_core::device::SourceKind;
use snipesync_core::http::RetryPolicy;
use snipesync_core::http::RetryingClient;
use snipesync_core::snipe::SnipeClient;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::Request;
use wiremock::Respond;
use wiremock::ResponseTemplate;
use wiremock::matchers::any;
use wiremock::matchers::method;
use wiremock::matchers::path;

pub const APPLE_MANUFACTURER_ID: u64 = 9;

/// Number of mutating calls the fake has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub asset_creates: usize,
    pub asset_updates: usize,
    pub asset_deletes: usize,
    pub model_creates: usize,
    pub model_updates: usize,
    pub checkouts: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    assets: BTreeMap<u64, Value>,
    models: BTreeMap<u64, Value>,
    users: Vec<Value>,
    counts: Counts,
    rejected_serials: BTreeSet<String>,
    rejected_models: BTreeSet<String>,
    reject_checkouts: bool,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn model_ref(&self, model_id: u64) -> Value {
        self.models
            .get(&model_id)
            .map(|model| json!({"id": model_id, "name": model["name"].clone()}))
            .unwrap_or(Value::Null)
    }
}

/// Stateful Snipe-IT stand-in covering the endpoints the sync uses.
#[derive(Debug, Clone, Default)]
pub struct FakeSnipe {
    state: Arc<Mutex<State>>,
}

fn success(payload: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "messages": "ok",
        "payload": payload,
    }))
}

fn api_error(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "error",
        "messages": message,
        "payload": null,
    }))
}

fn page(rows: Vec<Value>, offset: usize, limit: usize) -> ResponseTemplate {
    let total = rows.len();
    let rows: Vec<Value> = rows.into_iter().skip(offset).take(limit).collect();
    ResponseTemplate::new(200).set_body_json(json!({"total": total, "rows": rows}))
}

fn same(a: &Value, b: &str) -> bool {
    a.as_str().is_some_and(|a| a.eq_ignore_ascii_case(b))
}

impl FakeSnipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, name: &str) -> u64 {
        let mut state = self.state.lock().expect("fake state");
        let id = state.allocate();
        state
            .users
            .push(json!({"id": id, "name": name, "email": email, "username": name}));
        id
    }

    /// Seeds an asset directly, bypassing the API.
    pub fn add_asset(&self, serial: Option<&str>, manufacturer: &str) -> u64 {
        let mut state = self.state.lock().expect("fake state");
        let id = state.allocate();
        state.assets.insert(
            id,
            json!({
                "id": id,
                "serial": serial,
                "name": format!("Seeded {id}"),
                "asset_tag": serial,
                "manufacturer": {"id": id + 1000, "name": manufacturer},
                "assigned_to": null,
            }),
        );
        id
    }

    pub fn add_model(&self, name: &str, manufacturer_id: u64) -> u64 {
        let mut state = self.state.lock().expect("fake state");
        let id = state.allocate();
        state.models.insert(
            id,
            json!({
                "id": id,
                "name": name,
                "manufacturer": {"id": manufacturer_id, "name": format!("Manufacturer {manufacturer_id}")},
            }),
        );
        id
    }

    /// Asset creates for `serial` fail with a Snipe-IT validation error.
    pub fn reject_serial(&self, serial: &str) {
        let mut state = self.state.lock().expect("fake state");
        state.rejected_serials.insert(serial.to_uppercase());
    }

    /// Model creates whose name starts with `hardware_model` fail with a
    /// Snipe-IT validation error, whatever the category suffix.
    pub fn reject_model(&self, hardware_model: &str) {
        let mut state = self.state.lock().expect("fake state");
        state.rejected_models.insert(hardware_model.to_string());
    }

    /// Every checkout fails with a Snipe-IT error.
    pub fn reject_checkouts(&self) {
        self.state.lock().expect("fake state").reject_checkouts = true;
    }

    pub fn counts(&self) -> Counts {
        self.state.lock().expect("fake state").counts
    }

    pub fn serials(&self) -> BTreeSet<String> {
        self.state
            .lock()
            .expect("fake state")
            .assets
            .values()
            .filter_map(|asset| asset["serial"].as_str().map(str::to_string))
            .collect()
    }

    pub fn asset_count(&self) -> usize {
        self.state.lock().expect("fake state").assets.len()
    }

    pub fn asset_by_serial(&self, serial: &str) -> Option<Value> {
        self.state
            .lock()
            .expect("fake state")
            .assets
            .values()
            .find(|asset| same(&asset["serial"], serial))
            .cloned()
    }

    pub fn model(&self, model_id: u64) -> Option<Value> {
        self.state
            .lock()
            .expect("fake state")
            .models
            .get(&model_id)
            .cloned()
    }

    /// Routes every request to the fake.
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(any())
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn handle(
        &self,
        method: &str,
        segments: &[&str],
        query: &BTreeMap<String, String>,
        body: Value,
    ) -> ResponseTemplate {
        let mut state = self.state.lock().expect("fake state");
        let offset = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(50);
        let search = query.get("search").map(|s| s.to_lowercase());

        match (method, segments) {
            ("GET", ["hardware"]) => page(state.assets.values().cloned().collect(), offset, limit),
            ("GET", ["hardware", "byserial", serial]) => {
                let rows: Vec<Value> = state
                    .assets
                    .values()
                    .filter(|asset| same(&asset["serial"], serial))
                    .cloned()
                    .collect();
                if rows.is_empty() {
                    api_error("Asset does not exist.")
                } else {
                    page(rows, 0, usize::MAX)
                }
            }
            ("POST", ["hardware"]) => {
                let serial = body["serial"].as_str().unwrap_or_default().to_string();
                if state.rejected_serials.contains(&serial.to_uppercase()) {
                    return api_error("The asset tag field is invalid.");
                }
                if state.assets.values().any(|asset| same(&asset["serial"], &serial)) {
                    return api_error("The serial must be unique.");
                }
                let model_id = body["model_id"].as_u64().unwrap_or_default();
                let category_id = body["category_id"].as_u64().unwrap_or_default();
                let id = state.allocate();
                let model = state.model_ref(model_id);
                state.assets.insert(
                    id,
                    json!({
                        "id": id,
                        "serial": serial,
                        "name": body["name"].clone(),
                        "asset_tag": body["asset_tag"].clone(),
                        "notes": body["notes"].clone(),
                        "model": model,
                        "category": {"id": category_id, "name": null},
                        "manufacturer": {"id": APPLE_MANUFACTURER_ID, "name": "Apple"},
                        "assigned_to": null,
                    }),
                );
                state.counts.asset_creates += 1;
                success(json!({"id": id}))
            }
            ("PUT", ["hardware", id]) => {
                let Some(id) = id.parse::<u64>().ok().filter(|id| state.assets.contains_key(id)) else {
                    return ResponseTemplate::new(404);
                };
                let model = state.model_ref(body["model_id"].as_u64().unwrap_or_default());
                if let Some(asset) = state.assets.get_mut(&id) {
                    for field in ["name", "asset_tag", "serial", "notes"] {
                        if !body[field].is_null() {
                            asset[field] = body[field].clone();
                        }
                    }
                    asset["model"] = model;
                    asset["category"] = json!({"id": body["category_id"].clone(), "name": null});
                }
                state.counts.asset_updates += 1;
                success(json!({"id": id}))
            }
            ("DELETE", ["hardware", id]) => {
                let removed = id.parse::<u64>().ok().and_then(|id| state.assets.remove(&id));
                match removed {
                    Some(_) => {
                        state.counts.asset_deletes += 1;
                        success(Value::Null)
                    }
                    None => ResponseTemplate::new(404),
                }
            }
            ("POST", ["hardware", id, "checkout"]) => {
                if state.reject_checkouts {
                    return api_error("That asset is not available for checkout!");
                }
                let user_id = body["assigned_user"].as_u64().unwrap_or_default();
                let user = state.users.iter().find(|user| user["id"] == json!(user_id)).cloned();
                let (Some(user), Some(asset)) = (
                    user,
                    id.parse::<u64>().ok().and_then(|id| state.assets.get_mut(&id)),
                ) else {
                    return api_error("Checkout target not found.");
                };
                asset["assigned_to"] = json!({"id": user_id, "name": user["name"].clone()});
                let tag = asset["asset_tag"].clone();
                state.counts.checkouts += 1;
                success(json!({"asset": tag}))
            }
            ("GET", ["models"]) => {
                let rows: Vec<Value> = state
                    .models
                    .values()
                    .filter(|model| match &search {
                        Some(search) => model["name"]
                            .as_str()
                            .is_some_and(|name| name.to_lowercase().contains(search)),
                        None => true,
                    })
                    .cloned()
                    .collect();
                page(rows, offset, limit)
            }
            ("POST", ["models"]) => {
                let name = body["name"].as_str().unwrap_or_default();
                if state.rejected_models.iter().any(|model| name.starts_with(model.as_str())) {
                    return api_error("The name field is invalid.");
                }
                let id = state.allocate();
                state.models.insert(
                    id,
                    json!({
                        "id": id,
                        "name": body["name"].clone(),
                        "category": {"id": body["category_id"].clone(), "name": null},
                        "manufacturer": {"id": body["manufacturer_id"].clone(), "name": null},
                    }),
                );
                state.counts.model_creates += 1;
                success(json!({"id": id}))
            }
            ("PUT", ["models", id]) => {
                let Some(model) = id.parse::<u64>().ok().and_then(|id| state.models.get_mut(&id)) else {
                    return ResponseTemplate::new(404);
                };
                model["manufacturer"] = json!({"id": body["manufacturer_id"].clone(), "name": null});
                state.counts.model_updates += 1;
                success(json!({"id": id}))
            }
            ("GET", ["users"]) => {
                let rows: Vec<Value> = state
                    .users
                    .iter()
                    .filter(|user| match &search {
                        Some(search) => user["email"]
                            .as_str()
                            .is_some_and(|email| email.to_lowercase().contains(search)),
                        None => true,
                    })
                    .cloned()
                    .collect();
                page(rows, offset, limit)
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

impl Respond for FakeSnipe {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let Some(rest) = path.strip_prefix("/api/v1/") else {
            return ResponseTemplate::new(404);
        };
        let decoded: Vec<String> = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .collect();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
        let query: BTreeMap<String, String> = request
            .url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let body = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        self.handle(request.method.as_str(), &segments, &query, body)
    }
}

/// Starts a server with a fresh [`FakeSnipe`] mounted on it.
pub async fn start_fake_snipe() -> (MockServer, FakeSnipe) {
    let server = MockServer::start().await;
    let fake = FakeSnipe::new();
    fake.mount(&server).await;
    (server, fake)
}

pub fn snipe_config(server: &MockServer) -> SnipeConfig {
    SnipeConfig {
        base_url: Url::parse(&server.uri()).expect("mock server uri"),
        api_token: "test-token".to_string(),
        manufacturer_id: APPLE_MANUFACTURER_ID,
        status_id: 2,
    }
}

pub fn test_http() -> RetryingClient {
    RetryingClient::new(RetryPolicy::immediate()).expect("http client")
}

pub fn snipe_client(server: &MockServer) -> SnipeClient {
    SnipeClient::new(test_http(), &snipe_config(server))
}

pub fn device(serial: &str, model: &str) -> DeviceRecord {
    let mut record = DeviceRecord::new(serial, DeviceType::Computer, SourceKind::Jamf);
    record.name = format!("Mac {serial}");
    record.model = model.to_string();
    record
}

/// A computer served by [`mount_jamf`].
#[derive(Debug, Clone, Default)]
pub struct JamfComputer {
    pub serial: String,
    pub name: String,
    pub model: String,
    pub prestage: Option<String>,
    pub email: Option<String>,
}

impl JamfComputer {
    pub fn new(serial: &str, model: &str) -> Self {
        Self {
            serial: serial.to_string(),
            name: format!("Mac {serial}"),
            model: model.to_string(),
            ..Self::default()
        }
    }

    pub fn prestage(mut self, prestage: &str) -> Self {
        self.prestage = Some(prestage.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

/// Mounts a Jamf Pro API on `server`: OAuth token, one inventory page with
/// `computers`, a detail document per computer and no mobile devices.
pub async fn mount_jamf(server: &MockServer, computers: &[JamfComputer]) {
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "jamf-token", "expires_in": 1200})),
        )
        .mount(server)
        .await;

    let rows: Vec<Value> = computers
        .iter()
        .enumerate()
        .map(|(index, computer)| {
            json!({
                "id": (index + 1).to_string(),
                "general": {"name": computer.name},
                "hardware": {"serialNumber": computer.serial},
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/computers-inventory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"totalCount": rows.len(), "results": rows})),
        )
        .mount(server)
        .await;

    for (index, computer) in computers.iter().enumerate() {
        let id = (index + 1).to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/computers-inventory-detail/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "general": {
                    "name": computer.name,
                    "enrollmentMethod": computer.prestage.as_ref().map(|name| json!({"objectName": name})),
                },
                "hardware": {"serialNumber": computer.serial, "model": computer.model},
                "userAndLocation": {"email": computer.email},
            })))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/api/v2/mobile-devices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"totalCount": 0, "results": []})),
        )
        .mount(server)
        .await;
}
