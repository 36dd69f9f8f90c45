//! Appliance API interaction module
//!
//! Everything needed to talk to an appliance's management REST API.
//!
//! # Module Structure
//!
//! - [`auth`] - Basic auth credentials
//! - [`client`] - Main client exposing the `invoke_*` calls
//! - [`error`] - Typed errors callers match on
//! - [`facts`] - Firmware version and activated modules
//! - [`http`] - HTTP utilities for REST API calls
//! - [`response`] - The return object every operation produces
//!
//! # Example
//!
//! ```ignore
//! use isamcfg::appliance::{ApplianceClient, Credentials};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let creds = Credentials::resolve(Some("admin@local"), None)?;
//!     let client = ApplianceClient::new("isam.example.com", 443, creds, false, None)?;
//!     let dns = client.invoke_get("Retrieving DNS", "/net/dns", false).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod facts;
pub mod http;
pub mod response;

pub use auth::Credentials;
pub use client::ApplianceClient;
pub use error::ApplianceError;
pub use http::{format_appliance_error, UploadFile};
pub use response::ApiResponse;
