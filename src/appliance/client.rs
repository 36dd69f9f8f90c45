//! Appliance Client
//!
//! Main client for the management REST API, combining authentication,
//! HTTP transport and cached appliance facts.

use super::auth::Credentials;
use super::error::ApplianceError;
use super::facts::{ApplianceVersion, Facts, CAPABILITIES_URI, FIRMWARE_URI};
use super::http::{ApplianceHttpClient, UploadFile, DEFAULT_TIMEOUT};
use super::response::ApiResponse;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default management interface port
pub const DEFAULT_PORT: u16 = 443;

/// Main appliance client
#[derive(Clone)]
pub struct ApplianceClient {
    pub credentials: Credentials,
    pub http: ApplianceHttpClient,
    base_url: String,
    facts_cache: Arc<RwLock<Option<Facts>>>,
}

impl ApplianceClient {
    /// Create a client for `https://{hostname}:{port}`
    pub fn new(
        hostname: &str,
        port: u16,
        credentials: Credentials,
        verify_tls: bool,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = url::Url::parse(&format!("https://{}:{}", hostname, port))
            .with_context(|| format!("Invalid appliance address {}:{}", hostname, port))?;
        Self::with_base_url(base_url.as_str(), credentials, verify_tls, timeout)
    }

    /// Create a client for an explicit base URL (scheme, host and port)
    pub fn with_base_url(
        base_url: &str,
        credentials: Credentials,
        verify_tls: bool,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let http = ApplianceHttpClient::new(verify_tls, timeout.unwrap_or(DEFAULT_TIMEOUT))?;

        Ok(Self {
            credentials,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            facts_cache: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for an API path
    pub fn url(&self, uri: &str) -> String {
        if uri.starts_with('/') {
            format!("{}{}", self.base_url, uri)
        } else {
            format!("{}/{}", self.base_url, uri)
        }
    }

    // =========================================================================
    // Invocation helpers
    // =========================================================================

    /// Build a return object
    pub fn create_return_object(&self, data: Value, changed: bool, warnings: Vec<String>) -> ApiResponse {
        ApiResponse::new(data, changed, warnings)
    }

    /// GET a resource
    pub async fn invoke_get(&self, description: &str, uri: &str, ignore_error: bool) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let result = self.http.get(&self.url(uri), &self.credentials).await;
        tolerate(result.map(|data| ApiResponse::new(data, false, vec![])), ignore_error, description)
    }

    /// POST to a resource
    pub async fn invoke_post(
        &self,
        description: &str,
        uri: &str,
        body: &Value,
        ignore_error: bool,
    ) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let result = self.http.post(&self.url(uri), &self.credentials, Some(body)).await;
        tolerate(result.map(|data| ApiResponse::new(data, true, vec![])), ignore_error, description)
    }

    /// PUT to a resource
    pub async fn invoke_put(
        &self,
        description: &str,
        uri: &str,
        body: &Value,
        ignore_error: bool,
    ) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let result = self.http.put(&self.url(uri), &self.credentials, Some(body)).await;
        tolerate(result.map(|data| ApiResponse::new(data, true, vec![])), ignore_error, description)
    }

    /// DELETE a resource
    pub async fn invoke_delete(&self, description: &str, uri: &str, ignore_error: bool) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let result = self.http.delete(&self.url(uri), &self.credentials).await;
        tolerate(result.map(|data| ApiResponse::new(data, true, vec![])), ignore_error, description)
    }

    /// Download a resource into a local file
    pub async fn invoke_get_file(&self, description: &str, uri: &str, target: &Path) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let size = self
            .http
            .get_file(&self.url(uri), &self.credentials, target)
            .await?;

        Ok(ApiResponse::new(
            json!({"file": target.display().to_string(), "bytes": size}),
            true,
            vec![],
        ))
    }

    /// Upload files as a multipart form
    pub async fn invoke_post_files(
        &self,
        description: &str,
        uri: &str,
        files: &[UploadFile],
        fields: &[(String, String)],
        ignore_error: bool,
    ) -> Result<ApiResponse> {
        tracing::info!("{}", description);
        let result = self
            .http
            .post_files(&self.url(uri), &self.credentials, files, fields)
            .await;
        tolerate(result.map(|data| ApiResponse::new(data, true, vec![])), ignore_error, description)
    }

    // =========================================================================
    // Facts
    // =========================================================================

    /// Get appliance facts, fetching them on first use
    ///
    /// Only a complete read is cached; a failed read is returned as an error
    /// and retried on the next call.
    pub async fn facts(&self) -> Result<Facts> {
        {
            let cache = self.facts_cache.read().await;
            if let Some(facts) = cache.as_ref() {
                return Ok(facts.clone());
            }
        }

        let facts = self.fetch_facts().await?;

        {
            let mut cache = self.facts_cache.write().await;
            *cache = Some(facts.clone());
        }

        Ok(facts)
    }

    /// Drop cached facts (after a firmware update or module activation)
    pub async fn refresh_facts(&self) -> Result<Facts> {
        {
            let mut cache = self.facts_cache.write().await;
            *cache = None;
        }
        self.facts().await
    }

    async fn fetch_facts(&self) -> Result<Facts> {
        let firmware = self
            .http
            .get(&self.url(FIRMWARE_URI), &self.credentials)
            .await
            .context("Unable to read firmware version")?;
        let capabilities = self
            .http
            .get(&self.url(CAPABILITIES_URI), &self.credentials)
            .await
            .context("Unable to read activated modules")?;

        let facts = Facts::from_responses(&firmware, &capabilities);
        tracing::debug!(
            "Appliance facts: version={:?} modules={:?}",
            facts.version.as_ref().map(|v| v.to_string()),
            facts.activated_modules
        );
        Ok(facts)
    }

    /// Check version and module requirements
    ///
    /// Returns a warning when the appliance cannot serve the call.
    pub async fn check_requirements(
        &self,
        min_version: Option<&str>,
        required_modules: &[String],
    ) -> Result<Option<String>> {
        if min_version.is_none() && required_modules.is_empty() {
            return Ok(None);
        }

        let facts = self.facts().await?;

        if let Some(min) = min_version {
            let min: ApplianceVersion = min.parse()?;
            if !facts.meets_version(&min) {
                let current = facts
                    .version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                return Ok(Some(format!(
                    "API invoked requires minimum version: {}, appliance is of lower version: {}",
                    min, current
                )));
            }
        }

        for module in required_modules {
            if !facts.has_module(module) {
                return Ok(Some(format!(
                    "API invoked requires module: {}, appliance does not have it activated",
                    module
                )));
            }
        }

        Ok(None)
    }
}

/// Turn a tolerated HTTP failure into a return object with `rc` set
fn tolerate(result: Result<ApiResponse>, ignore_error: bool, description: &str) -> Result<ApiResponse> {
    match result {
        Ok(response) => Ok(response),
        Err(e) => {
            if ignore_error {
                if let Some(ApplianceError::Http { status, message }) = e.downcast_ref::<ApplianceError>() {
                    let warning = format!("{} failed with {}: {}", description, status, message);
                    let mut response = ApiResponse::skipped(warning);
                    response.rc = i32::from(status.as_u16());
                    response.data = Value::Null;
                    return Ok(response);
                }
            }
            Err(e.context(description.to_string()))
        },
    }
}
