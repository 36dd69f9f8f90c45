//! Pending changes
//!
//! Configuration changes are staged until deployed. Deploying with nothing
//! staged is a no-op.

use crate::appliance::{ApiResponse, ApplianceClient};
use crate::resource::operations::{extract_items, CallOptions};
use anyhow::Result;
use serde_json::Value;

pub const PENDING_CHANGES_URI: &str = "/isam/pending_changes";
pub const DEPLOY_URI: &str = "/isam/pending_changes/deploy";

/// The staged changes, normalised to a list
pub async fn get(client: &ApplianceClient) -> Result<ApiResponse> {
    let mut response = client
        .invoke_get("Retrieving pending changes", PENDING_CHANGES_URI, false)
        .await?;
    response.data = Value::Array(changes(&response.data));
    Ok(response)
}

fn changes(data: &Value) -> Vec<Value> {
    if data.is_array() {
        extract_items(data, "")
    } else {
        extract_items(data, "changes")
    }
}

/// Number of staged changes
pub async fn count(client: &ApplianceClient) -> Result<usize> {
    let response = get(client).await?;
    Ok(response.data.as_array().map(Vec::len).unwrap_or(0))
}

/// Deploy staged changes if there are any
pub async fn deploy(client: &ApplianceClient, opts: CallOptions) -> Result<ApiResponse> {
    let pending = count(client).await?;
    if pending == 0 && !opts.force {
        tracing::info!("No pending changes to deploy");
        return Ok(ApiResponse::unchanged());
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    // The appliance deploys on GET
    let mut response = client
        .invoke_get(&format!("Deploying {} pending changes", pending), DEPLOY_URI, opts.ignore_error)
        .await?;
    response.changed = response.is_success();
    Ok(response)
}

/// Throw away staged changes
pub async fn discard(client: &ApplianceClient, opts: CallOptions) -> Result<ApiResponse> {
    if count(client).await? == 0 {
        return Ok(ApiResponse::unchanged());
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    client
        .invoke_delete("Discarding pending changes", PENDING_CHANGES_URI, opts.ignore_error)
        .await
}
