use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::error::SyncErr;

/// Listing envelope used by every Snipe-IT collection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub model: Option<NamedRef>,
    #[serde(default)]
    pub manufacturer: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
}

impl Asset {
    /// Trimmed serial, `None` when missing or blank.
    pub fn serial(&self) -> Option<&str> {
        self.serial
            .as_deref()
            .map(str::trim)
            .filter(|serial| !serial.is_empty())
    }

    pub fn manufacturer_name(&self) -> &str {
        self.manufacturer
            .as_ref()
            .and_then(|manufacturer| manufacturer.name.as_deref())
            .unwrap_or("")
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.asset_tag.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Model {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub manufacturer: Option<NamedRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Body of `POST /hardware` and `PUT /hardware/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetPayload {
    pub asset_tag: String,
    pub serial: String,
    pub name: String,
    pub model_id: u64,
    pub category_id: u64,
    pub status_id: u64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewModel {
    pub name: String,
    pub category_id: u64,
    pub manufacturer_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub assigned_user: u64,
    pub checkout_to_type: &'static str,
    pub note: String,
}

impl CheckoutRequest {
    pub fn to_user(user_id: u64, note: impl Into<String>) -> Self {
        Self {
            assigned_user: user_id,
            checkout_to_type: "user",
            note: note.into(),
        }
    }
}

/// Envelope returned by Snipe-IT write endpoints. A 200 response can still
/// carry `"status": "error"`.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub messages: Value,
    #[serde(default)]
    pub payload: Value,
}

impl WriteResponse {
    pub fn into_result(self) -> Result<Value> {
        if self.status.as_deref() == Some("error") {
            return Err(SyncErr::Api(flatten_messages(&self.messages)));
        }
        Ok(self.payload)
    }

    /// Id of the created or updated object, when the payload carries one.
    pub fn into_id(self) -> Result<Option<u64>> {
        let payload = self.into_result()?;
        Ok(payload.get("id").and_then(Value::as_u64))
    }
}

/// Snipe-IT reports validation failures either as a string or as a map of
/// field name to list of messages.
fn flatten_messages(messages: &Value) -> String {
    match messages {
        Value::String(text) => text.clone(),
        Value::Object(fields) => fields
            .iter()
            .map(|(field, value)| match value {
                Value::Array(items) => {
                    let joined = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{field}: {joined}")
                }
                other => format!("{field}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}
