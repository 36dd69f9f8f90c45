//! Typed appliance errors
//!
//! Most failures travel as `anyhow::Error`. The variants here are the ones
//! callers need to match on, reached with `downcast_ref::<ApplianceError>()`.

use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum ApplianceError {
    /// The appliance answered with a non-success status
    #[error("API request failed: {status} {message}")]
    Http { status: StatusCode, message: String },

    /// No resource with this key exists in the registry
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A URI template placeholder had no value
    #[error("Missing parameter '{param}' for {uri}")]
    MissingParam { param: String, uri: String },

    /// The operation makes no sense for this resource kind
    #[error("{operation} is not supported for {resource}")]
    Unsupported { operation: String, resource: String },
}

impl ApplianceError {
    /// HTTP status, if this is an HTTP failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApplianceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// True when the error is an HTTP 404 from the appliance
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApplianceError>()
        .and_then(ApplianceError::status)
        .map(|s| s == StatusCode::NOT_FOUND)
        .unwrap_or(false)
}
