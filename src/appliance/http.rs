//! HTTP utilities for appliance REST API calls

use super::auth::Credentials;
use super::error::ApplianceError;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control() && c != ' ', "")
}

/// Pull the appliance's own error message out of an error body, if any
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .map(|m| sanitize_for_log(&m))
        .unwrap_or_default()
}

/// A file to send in a multipart upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Form field name the appliance expects
    pub field: String,
    pub path: PathBuf,
}

impl UploadFile {
    pub fn new(field: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            field: field.to_string(),
            path: path.into(),
        }
    }
}

/// HTTP client wrapper for appliance API calls
#[derive(Clone)]
pub struct ApplianceHttpClient {
    client: Client,
}

impl ApplianceHttpClient {
    /// Create a new HTTP client
    ///
    /// Appliances ship with self-signed certificates, so verification can be
    /// turned off per profile.
    pub fn new(verify_tls: bool, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("isamcfg/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn request(&self, method: Method, url: &str, creds: &Credentials) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&creds.username, Some(creds.password()))
    }

    /// Send a request and decode the JSON answer
    async fn send(&self, method: Method, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.context("Failed to send request")?;
        let response = check_status(method, response).await?;

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::debug!("Non-JSON response body: {}", sanitize_for_log(&body));
                Ok(Value::String(body))
            },
        }
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, creds: &Credentials) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(Method::GET, self.request(Method::GET, url, creds))
            .await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, creds: &Credentials, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let mut request = self.request(Method::POST, url, creds);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(Method::POST, request).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, creds: &Credentials, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("PUT {}", url);
        let mut request = self.request(Method::PUT, url, creds);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(Method::PUT, request).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, creds: &Credentials) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(Method::DELETE, self.request(Method::DELETE, url, creds))
            .await
    }

    /// GET a URL and write the body to a local file
    pub async fn get_file(&self, url: &str, creds: &Credentials, target: &Path) -> Result<u64> {
        tracing::debug!("GET {} -> {}", url, target.display());

        let response = self
            .request(Method::GET, url, creds)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .context("Failed to send request")?;
        let response = check_status(Method::GET, response).await?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(target, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        Ok(bytes.len() as u64)
    }

    /// POST a multipart form made of files and text fields
    pub async fn post_files(
        &self,
        url: &str,
        creds: &Credentials,
        files: &[UploadFile],
        fields: &[(String, String)],
    ) -> Result<Value> {
        tracing::debug!("POST (multipart) {}", url);

        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in files {
            let bytes = tokio::fs::read(&file.path)
                .await
                .with_context(|| format!("Failed to read {}", file.path.display()))?;
            let file_name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.field.clone());
            form = form.part(file.field.clone(), Part::bytes(bytes).file_name(file_name));
        }

        let request = self.request(Method::POST, url, creds).multipart(form);
        self.send(Method::POST, request).await
    }
}

/// Turn non-success statuses into [`ApplianceError::Http`]
async fn check_status(method: Method, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
    tracing::error!("API error: {} {} - {}", method, status, sanitize_for_log(&body));

    Err(ApplianceError::Http {
        status,
        message: error_message(&body),
    }
    .into())
}

/// Format an appliance API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_appliance_error(error: &anyhow::Error) -> String {
    if let Some(ApplianceError::Http { status, message }) = error.downcast_ref::<ApplianceError>() {
        let hint = match status.as_u16() {
            401 => "Authentication failed. Check the username and password.",
            403 => "Permission denied. Check the management account's roles.",
            404 => "Resource not found.",
            409 => "Resource conflict. The resource may already exist or be in use.",
            400 => "Invalid request. Check your parameters.",
            500 | 503 => "Appliance temporarily unavailable. Please try again.",
            _ => "Request failed.",
        };
        if message.is_empty() {
            return hint.to_string();
        }
        return format!("{} ({})", hint, message);
    }

    let error_str = format!("{:#}", error);

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| !c.is_control())
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
