//! Resources that do not fit the generic registry shape
//!
//! - [`junctions`] - composite key and replace-by-force semantics
//! - [`certificates`] - multipart import, export to file
//! - [`snapshots`] - upload, download, apply
//! - [`pending_changes`] - deploy staged configuration

pub mod certificates;
pub mod junctions;
pub mod pending_changes;
pub mod snapshots;
