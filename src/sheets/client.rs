use super::{HttpMethod, SheetsApi, SheetsCall};
use crate::auth::CredentialProvider;
use crate::errors::RemoteApiError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Sheets API client that asks the credential provider for a bearer token
/// on every call.
pub struct GoogleSheetsClient {
    http: Client,
    base_url: String,
    credentials: Arc<CredentialProvider>,
}

impl GoogleSheetsClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, call: &SheetsCall) -> String {
        format!("{}{}", self.base_url, call.path())
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn execute(&self, call: &SheetsCall) -> Result<Value> {
        let token = self.credentials.access_token().await?;
        let url = self.url(call);
        debug!(method = ?call.method(), url = %url, "calling Google Sheets API");

        let builder = match call.method() {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
        };
        let mut builder = builder.bearer_auth(token).query(&call.query());
        if let Some(body) = call.body() {
            builder = builder.json(&body);
        }

        let response = builder.send().await.context("HTTP request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        if status == StatusCode::UNAUTHORIZED {
            warn!("access token rejected; clearing cached credential");
            self.credentials.reset().await;
        }

        if !status.is_success() {
            let err = remote_error(status, &body);
            error!("{err}");
            return Err(err.into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&body)
            .with_context(|| format!("failed to parse JSON response (status {status})"))
    }
}

/// Google error bodies look like `{"error": {"code", "message", "status", "details"}}`.
fn remote_error(status: StatusCode, body: &str) -> RemoteApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error_obj = parsed.as_ref().and_then(|v| v.get("error"));

    let message = error_obj
        .and_then(|obj| obj.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    let err = RemoteApiError::new(status.as_u16(), message);
    match error_obj {
        Some(details) => err.with_details(details.clone()),
        None => err,
    }
}
