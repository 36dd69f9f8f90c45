//! Idempotent configuration client for IBM Security Verify Access appliances
//!
//! # Modules
//!
//! - [`appliance`] - REST client, credentials, facts and the return object
//! - [`compare`] - canonical JSON comparison and structural diffs
//! - [`resource`] - registry-driven generic CRUD operations
//! - [`modules`] - junctions, certificates, snapshots, pending changes
//! - [`state`] - desired-state documents
//! - [`config`] - persisted appliance profiles
//!
//! Every mutating call reads the current state first and only writes when the
//! canonical form of the desired state differs, so running the same request
//! twice reports `changed: false` the second time.

pub mod appliance;
pub mod compare;
pub mod config;
pub mod modules;
pub mod resource;
pub mod state;

pub use appliance::{ApiResponse, ApplianceClient, ApplianceError, Credentials};
pub use resource::{CallOptions, Endpoint, PathParams};
