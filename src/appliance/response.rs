//! Return object shared by every operation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one appliance operation
///
/// `rc` is 0 on success. When an HTTP failure was tolerated through
/// `ignore_error`, `rc` carries the HTTP status instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub rc: i32,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            rc: 0,
            data: Value::Object(serde_json::Map::new()),
            changed: false,
            warnings: Vec::new(),
        }
    }
}

impl ApiResponse {
    /// Build a return object
    pub fn new(data: Value, changed: bool, warnings: Vec<String>) -> Self {
        Self {
            rc: 0,
            data,
            changed,
            warnings,
        }
    }

    /// Unchanged response with no data
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Response for a mutation that check mode kept from running
    pub fn would_change() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    /// Unchanged response carrying a single warning
    pub fn skipped(warning: impl Into<String>) -> Self {
        Self::default().warn(warning)
    }

    /// Append a warning
    pub fn warn(mut self, warning: impl Into<String>) -> Self {
        let warning = warning.into();
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
        self
    }

    /// Prepend warnings gathered by earlier steps
    pub fn with_warnings(mut self, mut earlier: Vec<String>) -> Self {
        earlier.append(&mut self.warnings);
        self.warnings = earlier;
        self
    }

    pub fn is_success(&self) -> bool {
        self.rc == 0
    }

    /// True when the appliance returned nothing useful
    pub fn is_empty(&self) -> bool {
        match &self.data {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}
