//! Jamf Pro Classic API client: the device-management source of truth.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::config::JamfConfig;
use crate::http::{ApiRequest, ClientSession, RetryPolicy};

pub mod types;
pub use types::{Computer, ComputerRef};
use types::{ComputerEnvelope, ComputerList};

/// Read access to the device inventory being mirrored.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn get_all_computers(&self) -> Result<Vec<ComputerRef>>;
    async fn find_computer(&self, computer_id: u64) -> Result<Option<Computer>>;
}

pub struct JamfClient {
    session: ClientSession,
}

impl JamfClient {
    /// Builds a session against the Classic API with Basic auth baked into
    /// the fixed header set.
    pub fn new(config: &JamfConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password));
        let mut auth_value = HeaderValue::from_str(&format!("Basic {}", credentials))
            .context("Invalid Jamf Pro credentials")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let base = format!("{}/JSSResource", config.url.trim_end_matches('/'));
        let session = ClientSession::new(base, headers, RetryPolicy::with_attempts(config.attempts))?;
        Ok(Self { session })
    }

    /// GET a Classic API endpoint, tolerating 404 as an absent record.
    /// A body that survives transport but does not match the expected shape
    /// is a permanent error, never retried.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let request = ApiRequest::get(self.session.endpoint(path));
        match self.session.send(&request, true).await? {
            Some(body) => {
                let parsed = serde_json::from_value(body)
                    .context("Unexpected Jamf Pro API response shape")?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InventorySource for JamfClient {
    #[tracing::instrument(skip(self))]
    async fn get_all_computers(&self) -> Result<Vec<ComputerRef>> {
        debug!("Fetching the computer list from Jamf Pro...");
        let list: Option<ComputerList> = self.get_json("computers").await?;
        Ok(list.map(|l| l.computers).unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    async fn find_computer(&self, computer_id: u64) -> Result<Option<Computer>> {
        let envelope: Option<ComputerEnvelope> = self
            .get_json(&format!("computers/id/{}", computer_id))
            .await?;
        Ok(envelope.and_then(|e| e.computer))
    }
}
