//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing appliance
//! resources. Resource definitions are loaded from JSON files at compile time,
//! so a new resource type needs a registry entry rather than new code.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`endpoint`] - Binds a definition to path parameters and builds URIs
//! - [`operations`] - Generic get/search/add/update/delete/set/compare
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `system.json` - Networking, accounts, snapshots, extensions, containers
//! - `wga.json` - Reverse proxy instances, junctions, LDAP suffixes
//! - `aac.json` - Access control and API protection
//! - `ssl.json` - Certificate databases and certificates
//!
//! # Example
//!
//! ```ignore
//! use isamcfg::resource::{operations, CallOptions, Endpoint, PathParams};
//! use serde_json::json;
//!
//! async fn ensure_host(client: &ApplianceClient) -> anyhow::Result<()> {
//!     let endpoint = Endpoint::lookup("host-records", PathParams::new())?;
//!     let body = json!({"addr": "10.0.0.8", "hostnames": ["ldap.internal"]});
//!     let response = operations::set(client, &endpoint, &body, CallOptions::default()).await?;
//!     println!("changed: {}", response.changed);
//!     Ok(())
//! }
//! ```

pub mod endpoint;
pub mod operations;
mod registry;

pub use endpoint::{Endpoint, PathParams};
pub use operations::CallOptions;
pub use registry::*;
