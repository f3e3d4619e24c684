//! Snipe-IT API client: the asset registry being reconciled.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{error, info};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::SnipeConfig;
use crate::http::{ApiRequest, ClientSession, RetryPolicy};

pub mod types;
pub use types::{Asset, AssignedUser, Model, User};

/// Read/write access to the asset registry. Mutations that the API rejects
/// at the application level (a well-formed non-success response) surface as
/// `Ok(false)` for assignment calls and as permanent errors for creation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    async fn find_asset(&self, serial: &str) -> Result<Option<Asset>>;
    async fn find_model(&self, model_number: &str) -> Result<Option<Model>>;
    async fn find_user(&self, username: &str) -> Result<Option<User>>;
    async fn create_asset(&self, payload: Value) -> Result<u64>;
    async fn create_model(&self, payload: Value) -> Result<u64>;
    async fn create_user(&self, payload: Value) -> Result<User>;
    async fn patch_asset(&self, asset_id: u64, payload: Value) -> Result<()>;
    async fn checkout(&self, asset_id: u64, user_id: u64, name: Option<String>) -> Result<bool>;
    async fn checkin(&self, asset_id: u64) -> Result<bool>;
}

pub struct SnipeClient {
    session: ClientSession,
}

impl SnipeClient {
    /// Builds a session against the v1 API with the Bearer token baked into
    /// the fixed header set.
    pub fn new(config: &SnipeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .context("Invalid Snipe-IT API token")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let base = format!("{}/api/v1", config.url.trim_end_matches('/'));
        let session = ClientSession::new(base, headers, RetryPolicy::with_attempts(config.attempts))?;
        Ok(Self { session })
    }

    /// GET a search endpoint and return its `rows`. A response without a
    /// rows array survived transport but fails shape validation, which is
    /// permanent and never retried.
    async fn get_rows(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let request = ApiRequest::get_with_query(self.session.endpoint(path), query);
        let mut body = self
            .session
            .send(&request, false)
            .await?
            .unwrap_or(Value::Null);

        match body.pointer_mut("/rows").map(Value::take) {
            Some(Value::Array(rows)) => Ok(rows),
            _ => bail!("Unexpected API response. Missing rows array"),
        }
    }

    /// The search endpoints identify one record; more than one row for the
    /// same identifier is a permanent error.
    async fn get_single<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let mut rows = self.get_rows(path, query).await?;
        if rows.len() > 1 {
            bail!("Unexpected API response. Multiple objects with the same identifier");
        }
        match rows.pop() {
            Some(row) => Ok(Some(
                serde_json::from_value(row).context("Unexpected Snipe-IT API response shape")?,
            )),
            None => Ok(None),
        }
    }

    /// Issues a mutation and requires the application-level status field to
    /// report success, failing permanently with the API's messages otherwise.
    async fn mutate(&self, request: ApiRequest) -> Result<Value> {
        let response = self
            .session
            .send(&request, false)
            .await?
            .unwrap_or(Value::Null);

        if response.get("status").and_then(Value::as_str) == Some("success") {
            return Ok(response);
        }
        bail!("API returned an error response: {}", messages_from(&response))
    }

    /// Like [`mutate`](Self::mutate), but assignment rejections are logged
    /// and reported as `false` rather than failing the record.
    async fn mutate_status(&self, request: ApiRequest) -> Result<bool> {
        let response = self
            .session
            .send(&request, false)
            .await?
            .unwrap_or(Value::Null);

        if response.get("status").and_then(Value::as_str) == Some("success") {
            return Ok(true);
        }
        error!("API returned an error response: {}", messages_from(&response));
        Ok(false)
    }
}

fn messages_from(response: &Value) -> String {
    match response.get("messages") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "Unknown error".to_string(),
    }
}

fn created_id(response: &Value) -> Result<u64> {
    response
        .pointer("/payload/id")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("Unexpected API response. Missing created id"))
}

#[async_trait]
impl AssetRegistry for SnipeClient {
    #[tracing::instrument(skip(self))]
    async fn find_asset(&self, serial: &str) -> Result<Option<Asset>> {
        self.get_single("hardware", &[("search", serial)]).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_model(&self, model_number: &str) -> Result<Option<Model>> {
        self.get_single("models", &[("search", model_number)]).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        self.get_single("users", &[("search", username)]).await
    }

    #[tracing::instrument(skip(self, payload))]
    async fn create_asset(&self, payload: Value) -> Result<u64> {
        let request = ApiRequest::post(self.session.endpoint("hardware"), Some(payload));
        let response = self.mutate(request).await?;
        created_id(&response)
    }

    #[tracing::instrument(skip(self, payload))]
    async fn create_model(&self, payload: Value) -> Result<u64> {
        let request = ApiRequest::post(self.session.endpoint("models"), Some(payload));
        let response = self.mutate(request).await?;
        created_id(&response)
    }

    #[tracing::instrument(skip(self, payload))]
    async fn create_user(&self, payload: Value) -> Result<User> {
        let request = ApiRequest::post(self.session.endpoint("users"), Some(payload));
        let mut response = self.mutate(request).await?;
        let created = response
            .pointer_mut("/payload")
            .map(Value::take)
            .ok_or_else(|| anyhow!("Unexpected API response. Missing created user"))?;
        serde_json::from_value(created).context("Unexpected Snipe-IT API response shape")
    }

    #[tracing::instrument(skip(self, payload))]
    async fn patch_asset(&self, asset_id: u64, payload: Value) -> Result<()> {
        let request = ApiRequest::patch(
            self.session.endpoint(&format!("hardware/{}", asset_id)),
            payload,
        );
        self.mutate(request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn checkout(&self, asset_id: u64, user_id: u64, name: Option<String>) -> Result<bool> {
        info!("Checking out asset {} to user {}", asset_id, user_id);

        let mut payload = json!({"checkout_to_type": "user", "assigned_user": user_id});
        if let Some(name) = name {
            payload["name"] = json!(name);
        }
        let request = ApiRequest::post(
            self.session.endpoint(&format!("hardware/{}/checkout", asset_id)),
            Some(payload),
        );
        self.mutate_status(request).await
    }

    #[tracing::instrument(skip(self))]
    async fn checkin(&self, asset_id: u64) -> Result<bool> {
        info!("Checking in asset {}", asset_id);

        let request = ApiRequest::post(
            self.session.endpoint(&format!("hardware/{}/checkin", asset_id)),
            None,
        );
        self.mutate_status(request).await
    }
}
