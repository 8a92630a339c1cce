//! Snipe-IT REST client.

mod types;

pub use types::Asset;
pub use types::AssetPayload;
pub use types::CheckoutRequest;
pub use types::Model;
pub use types::NamedRef;
pub use types::NewModel;
pub use types::Page;
pub use types::User;
pub use types::WriteResponse;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use tracing::info;

use crate::config::SnipeConfig;
use crate::error::Result;
use crate::error::SyncErr;
use crate::http::RetryingClient;

const PAGE_SIZE: u64 = 500;
const SEARCH_LIMIT: u64 = 50;

#[derive(Debug, Clone)]
pub struct SnipeClient {
    http: RetryingClient,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SerialLookup {
    #[serde(default)]
    rows: Vec<Asset>,
}

impl SnipeClient {
    pub fn new(http: RetryingClient, config: &SnipeConfig) -> Self {
        Self {
            http,
            api_base: format!("{}/api/v1", config.base_url.as_str().trim_end_matches('/')),
            token: config.api_token.clone(),
        }
    }

    pub fn http(&self) -> &RetryingClient {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.url(path);
        self.http
            .send_json(|http| {
                http.get(&url)
                    .bearer_auth(&self.token)
                    .header("Accept", "application/json")
                    .query(query)
            })
            .await
    }

    async fn write(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<WriteResponse> {
        let url = self.url(path);
        self.http
            .send_json(|http| {
                let request = http
                    .request(method.clone(), &url)
                    .bearer_auth(&self.token)
                    .header("Accept", "application/json");
                match body {
                    Some(body) => request.json(body),
                    None => request,
                }
            })
            .await
    }

    /// Every asset in Snipe-IT, fetched in pages of 500.
    pub async fn list_hardware(&self) -> Result<Vec<Asset>> {
        let mut assets = Vec::new();
        let mut offset = 0;
        loop {
            let page: Page<Asset> = self
                .get(
                    "hardware",
                    &[("limit", PAGE_SIZE.to_string()), ("offset", offset.to_string())],
                )
                .await?;
            let fetched = page.rows.len() as u64;
            assets.extend(page.rows);
            offset += fetched;
            debug!(fetched = assets.len(), total = page.total, "fetched Snipe-IT assets");
            if fetched == 0 || offset >= page.total {
                break;
            }
        }
        info!("loaded {} assets from Snipe-IT", assets.len());
        Ok(assets)
    }

    pub async fn find_by_serial(&self, serial: &str) -> Result<Option<Asset>> {
        let path = format!("hardware/byserial/{}", urlencoding::encode(serial));
        match self.get::<SerialLookup>(&path, &[]).await {
            Ok(lookup) => Ok(lookup.rows.into_iter().next()),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_asset(&self, payload: &AssetPayload) -> Result<u64> {
        let body = serde_json::to_value(payload)?;
        let response = self.write(reqwest::Method::POST, "hardware", Some(&body)).await?;
        response
            .into_id()?
            .ok_or_else(|| SyncErr::Api("create response did not include an asset id".to_string()))
    }

    pub async fn update_asset(&self, asset_id: u64, payload: &AssetPayload) -> Result<()> {
        let body = serde_json::to_value(payload)?;
        self.write(reqwest::Method::PUT, &format!("hardware/{asset_id}"), Some(&body))
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn delete_asset(&self, asset_id: u64) -> Result<()> {
        self.write(reqwest::Method::DELETE, &format!("hardware/{asset_id}"), None)
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn checkout(&self, asset_id: u64, request: &CheckoutRequest) -> Result<()> {
        let body = serde_json::to_value(request)?;
        self.write(
            reqwest::Method::POST,
            &format!("hardware/{asset_id}/checkout"),
            Some(&body),
        )
        .await?
        .into_result()?;
        Ok(())
    }

    pub async fn search_models(&self, search: &str) -> Result<Vec<Model>> {
        let page: Page<Model> = self
            .get(
                "models",
                &[("search", search.to_string()), ("limit", SEARCH_LIMIT.to_string())],
            )
            .await?;
        Ok(page.rows)
    }

    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let mut models = Vec::new();
        let mut offset = 0;
        loop {
            let page: Page<Model> = self
                .get(
                    "models",
                    &[("limit", PAGE_SIZE.to_string()), ("offset", offset.to_string())],
                )
                .await?;
            let fetched = page.rows.len() as u64;
            models.extend(page.rows);
            offset += fetched;
            if fetched == 0 || offset >= page.total {
                break;
            }
        }
        Ok(models)
    }

    pub async fn create_model(&self, model: &NewModel) -> Result<u64> {
        let body = serde_json::to_value(model)?;
        self.write(reqwest::Method::POST, "models", Some(&body))
            .await?
            .into_id()?
            .ok_or_else(|| SyncErr::Api("create response did not include a model id".to_string()))
    }

    pub async fn update_model_manufacturer(&self, model_id: u64, manufacturer_id: u64) -> Result<()> {
        let body = json!({ "manufacturer_id": manufacturer_id });
        self.write(reqwest::Method::PUT, &format!("models/{model_id}"), Some(&body))
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn search_users(&self, search: &str) -> Result<Vec<User>> {
        let page: Page<User> = self
            .get(
                "users",
                &[("search", search.to_string()), ("limit", SEARCH_LIMIT.to_string())],
            )
            .await?;
        Ok(page.rows)
    }

    /// Cheap authenticated call used by `check`; returns the asset total.
    pub async fn ping(&self) -> Result<u64> {
        let page: Page<Asset> = self.get("hardware", &[("limit", "1".to_string())]).await?;
        Ok(page.total)
    }
}
