//! Appliance Facts
//!
//! Firmware version and activated modules, used to gate calls that only
//! exist on newer firmware or with a given module activated.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// URI listing firmware partitions
pub const FIRMWARE_URI: &str = "/firmware_settings";

/// URI listing activated capabilities
pub const CAPABILITIES_URI: &str = "/isam/capabilities/v1";

/// Dotted numeric firmware version (e.g. `10.0.6.0`)
///
/// Missing trailing components compare as zero, so `10.0` == `10.0.0.0`.
#[derive(Debug, Clone, Eq, Serialize)]
#[serde(into = "String")]
pub struct ApplianceVersion {
    parts: Vec<u64>,
    raw: String,
}

impl ApplianceVersion {
    fn padded(&self, len: usize) -> impl Iterator<Item = u64> + '_ {
        self.parts
            .iter()
            .copied()
            .chain(std::iter::repeat(0))
            .take(len)
    }
}

impl FromStr for ApplianceVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Builds may carry a suffix such as "10.0.6.0_IF1"
        let numeric = trimmed
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or("");

        let parts = numeric
            .split('.')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| anyhow::anyhow!("Invalid version: {}", s))?;

        if parts.is_empty() {
            anyhow::bail!("Invalid version: {}", s);
        }

        Ok(Self {
            parts,
            raw: trimmed.to_string(),
        })
    }
}

impl PartialEq for ApplianceVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for ApplianceVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        self.padded(len).cmp(other.padded(len))
    }
}

impl PartialOrd for ApplianceVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApplianceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<ApplianceVersion> for String {
    fn from(v: ApplianceVersion) -> Self {
        v.raw
    }
}

/// What we know about an appliance
#[derive(Debug, Clone, Serialize)]
pub struct Facts {
    pub version: Option<ApplianceVersion>,
    pub activated_modules: Vec<String>,
}

impl Facts {
    /// Build facts from the firmware and capabilities responses
    pub fn from_responses(firmware: &Value, capabilities: &Value) -> Self {
        Self {
            version: active_firmware_version(firmware),
            activated_modules: activated_modules(capabilities),
        }
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.activated_modules.iter().any(|m| m == module)
    }

    /// Whether the firmware is at least `min`
    ///
    /// An unknown firmware version is treated as satisfying the requirement so
    /// the appliance gets to reject the call itself.
    pub fn meets_version(&self, min: &ApplianceVersion) -> bool {
        match &self.version {
            Some(v) => v >= min,
            None => true,
        }
    }
}

/// Version of the active firmware partition
fn active_firmware_version(firmware: &Value) -> Option<ApplianceVersion> {
    let partitions = firmware.as_array()?;
    let active = partitions
        .iter()
        .find(|p| truthy(p.get("active")))
        .or_else(|| partitions.first())?;

    active
        .get("firmware_version")
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse().ok())
}

/// Ids of enabled capabilities
///
/// Accepts both `[{"id": "wga", "enabled": true}]` and a bare list of ids.
fn activated_modules(capabilities: &Value) -> Vec<String> {
    let items = match capabilities {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("capabilities").and_then(|v| v.as_array()) {
            Some(items) => items.as_slice(),
            None => return vec![],
        },
        _ => return vec![],
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.clone()),
            Value::Object(map) => {
                let enabled = map.get("enabled").map(|v| truthy(Some(v))).unwrap_or(true);
                if enabled {
                    map.get("id").and_then(|v| v.as_str()).map(str::to_string)
                } else {
                    None
                }
            },
            _ => None,
        })
        .collect()
}

/// The API mixes real booleans with "true"/"True" strings
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes"),
        _ => false,
    }
}
