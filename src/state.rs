//! Desired-state documents
//!
//! A YAML (or JSON) file lists resources and whether they should be present.
//! Applying it converges the appliance one entry at a time.
//!
//! ```yaml
//! deploy: true
//! resources:
//!   - resource: dns
//!     data: { primaryServer: 10.0.0.2 }
//!   - resource: junctions
//!     params: { instance: default }
//!     data:
//!       junction_point: /app
//!       junction_type: tcp
//!       server_hostname: backend.internal
//!       server_port: 8080
//!   - resource: host-records
//!     state: absent
//!     data: { addr: 10.0.0.99 }
//! ```

use crate::appliance::{ApiResponse, ApplianceClient};
use crate::modules::{junctions, pending_changes};
use crate::resource::operations::{self, CallOptions};
use crate::resource::{Endpoint, PathParams};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Whether an entry should exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

/// One resource in a state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub resource: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub state: Presence,
    /// Full document when present, key fields when absent
    #[serde(default)]
    pub data: Value,
}

/// A whole state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    /// Deploy pending changes after a run that changed something
    #[serde(default)]
    pub deploy: bool,
    pub resources: Vec<StateEntry>,
}

impl StateDocument {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse state document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content)
    }
}

/// Outcome of one entry
#[derive(Debug, Clone, Serialize)]
pub struct EntryOutcome {
    pub resource: String,
    pub state: Presence,
    pub response: ApiResponse,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub changed: bool,
    pub entries: Vec<EntryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<ApiResponse>,
}

/// Converge the appliance to a state document
pub async fn apply(client: &ApplianceClient, document: &StateDocument, opts: CallOptions) -> Result<ApplyReport> {
    let mut entries = Vec::with_capacity(document.resources.len());

    for (idx, entry) in document.resources.iter().enumerate() {
        let response = apply_entry(client, entry, opts)
            .await
            .with_context(|| format!("Entry #{} ({})", idx + 1, entry.resource))?;
        tracing::info!(
            "{} {:?}: changed={} warnings={}",
            entry.resource,
            entry.state,
            response.changed,
            response.warnings.len()
        );
        entries.push(EntryOutcome {
            resource: entry.resource.clone(),
            state: entry.state,
            response,
        });
    }

    let changed = entries.iter().any(|e| e.response.changed);
    let deploy = if document.deploy && changed {
        Some(pending_changes::deploy(client, opts).await?)
    } else {
        None
    };

    Ok(ApplyReport {
        changed,
        entries,
        deploy,
    })
}

async fn apply_entry(client: &ApplianceClient, entry: &StateEntry, opts: CallOptions) -> Result<ApiResponse> {
    let params: PathParams = entry.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    if entry.resource == "junctions" {
        let instance = params
            .get("instance")
            .context("junctions entries need params.instance")?;
        return match entry.state {
            Presence::Present => {
                let junction: junctions::Junction =
                    serde_json::from_value(entry.data.clone()).context("Invalid junction definition")?;
                junctions::set(client, instance, &junction, opts).await
            },
            Presence::Absent => {
                let point = entry
                    .data
                    .get("junction_point")
                    .or_else(|| entry.data.get("id"))
                    .and_then(|v| v.as_str())
                    .context("junctions entries need data.junction_point")?;
                junctions::delete(client, instance, point, opts).await
            },
        };
    }

    let endpoint = Endpoint::lookup(&entry.resource, params)?;
    match entry.state {
        Presence::Present => operations::set(client, &endpoint, &entry.data, opts).await,
        Presence::Absent => operations::delete(client, &endpoint, &entry.data, opts).await,
    }
}
