//! REST client for the hosted relational backend.
//!
//! Thin wrapper over the backend's table API: select with ordering/limit,
//! insert, update-by-id, delete-by-id, batched update, and upsert with a
//! conflict target. Authentication is a project API key plus the signed-in
//! user's bearer token; row-level security on the server decides what each
//! request may touch.

use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error body shape returned by the backend's REST layer.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Client for the hosted backend's table and storage APIs.
#[derive(Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    config: BackendConfig,
    access_token: RwLock<String>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            config,
            access_token: RwLock::new(String::new()),
        }
    }

    /// Replace the bearer token after sign-in or refresh.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().unwrap() = token.into();
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|_| BackendError::auth("Invalid API key format"))?;
        headers.insert("apikey", api_key);

        let token = self.access_token.read().unwrap().clone();
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| BackendError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let schema = HeaderValue::from_str(&self.config.schema)
            .map_err(|_| BackendError::invalid_request("Invalid schema name"))?;
        headers.insert("accept-profile", schema.clone());
        headers.insert("content-profile", schema);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> BackendError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            let message = match error.code {
                Some(code) => format!("{}: {}", code, error.message),
                None => error.message,
            };
            return BackendError::api(status.as_u16(), message);
        }
        BackendError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to deserialize response. Body: {}, Error: {}", body, e);
            BackendError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check status on responses whose body we discard.
    async fn ensure_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            debug!("API response status: {}", status);
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(Self::api_error(status, &body))
    }

    /// Select all columns, ordered newest-first on `order_desc_by`, capped at
    /// `limit` rows.
    ///
    /// GET /rest/v1/{table}?select=*&order={col}.desc&limit={n}
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        order_desc_by: &str,
        limit: usize,
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers()?)
            .query(&[
                ("select", "*".to_string()),
                ("order", format!("{}.desc", order_desc_by)),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Insert one row and return the stored representation.
    ///
    /// POST /rest/v1/{table}
    pub async fn insert<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        let mut rows: Vec<R> = Self::parse_response(response).await?;
        if rows.is_empty() {
            return Err(BackendError::invalid_request(
                "Insert returned an empty representation",
            ));
        }
        Ok(rows.remove(0))
    }

    /// Patch one row by primary key.
    ///
    /// PATCH /rest/v1/{table}?id=eq.{id}
    pub async fn update_by_id<T: Serialize + Sync>(
        &self,
        table: &str,
        id: &str,
        patch: &T,
    ) -> Result<()> {
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{}", id))])
            .json(patch)
            .send()
            .await?;

        Self::ensure_success(response).await
    }

    /// Patch every row whose id is in `ids` with one request.
    ///
    /// PATCH /rest/v1/{table}?id=in.(a,b,c)
    pub async fn update_by_ids<T: Serialize + Sync>(
        &self,
        table: &str,
        ids: &[String],
        patch: &T,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("in.({})", ids.join(",")))])
            .json(patch)
            .send()
            .await?;

        Self::ensure_success(response).await
    }

    /// Delete one row by primary key.
    ///
    /// DELETE /rest/v1/{table}?id=eq.{id}
    pub async fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        Self::ensure_success(response).await
    }

    /// Insert-or-update with an explicit conflict target, merging duplicates.
    ///
    /// POST /rest/v1/{table}?on_conflict={columns}
    pub async fn upsert<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
        on_conflict_columns: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", on_conflict_columns)])
            .json(row)
            .send()
            .await?;

        Self::ensure_success(response).await
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }
}
