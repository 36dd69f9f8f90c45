//! Idempotency and drift comparison
//!
//! - [`canonical`] - canonical JSON form and equality used before every update
//! - [`diff`] - path-addressed differences between two canonical documents

pub mod canonical;
pub mod diff;

pub use canonical::{json_compare, json_compare_ignoring, json_sort, project_onto, without_keys, Canonical};
pub use diff::{diff, diff_keyed, format_summary, format_text, DiffEntry};
