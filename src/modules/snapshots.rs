//! Configuration snapshots
//!
//! Snapshots are identified by the appliance's record id. The comment is the
//! only stable, user-chosen attribute, so it serves as the idempotency key.

use crate::appliance::{ApiResponse, ApplianceClient, UploadFile};
use crate::resource::operations::{self, CallOptions};
use crate::resource::{Endpoint, PathParams};
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

const RESOURCE_KEY: &str = "snapshots";

fn endpoint() -> Result<Endpoint<'static>> {
    Endpoint::lookup(RESOURCE_KEY, PathParams::new())
}

/// File name for a download when the caller gives none
pub fn default_download_name() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("isam-snapshot-{}.snapshot", stamp))
}

/// List snapshots
pub async fn get_all(client: &ApplianceClient) -> Result<ApiResponse> {
    operations::get_all(client, &endpoint()?, CallOptions::default()).await
}

/// Id of the snapshot carrying `comment`
pub async fn search(client: &ApplianceClient, comment: &str) -> Result<Option<String>> {
    let mut key = Map::new();
    key.insert("comment".into(), comment.into());
    operations::search(client, &endpoint()?, &key).await
}

async fn exists_by_id(client: &ApplianceClient, id: &str) -> Result<bool> {
    let all = get_all(client).await?;
    Ok(all
        .data
        .as_array()
        .map(|items| {
            items.iter().any(|s| match s.get("id") {
                Some(Value::String(v)) => v == id,
                Some(Value::Number(n)) => n.to_string() == id,
                _ => false,
            })
        })
        .unwrap_or(false))
}

/// Take a snapshot of the current configuration, once per comment
pub async fn create(client: &ApplianceClient, comment: &str, opts: CallOptions) -> Result<ApiResponse> {
    if !opts.force && search(client, comment).await?.is_some() {
        return Ok(ApiResponse::skipped(format!("Snapshot '{}' already exists", comment)));
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    client
        .invoke_post(
            &format!("Creating snapshot '{}'", comment),
            &endpoint()?.collection_uri()?,
            &json!({ "comment": comment }),
            opts.ignore_error,
        )
        .await
}

/// Download snapshots (comma separated ids) into `target`
pub async fn download(client: &ApplianceClient, ids: &[String], target: &Path) -> Result<ApiResponse> {
    if ids.is_empty() {
        anyhow::bail!("No snapshot ids given");
    }
    let uri = format!(
        "{}/download?record_ids={}",
        endpoint()?.collection_uri()?,
        urlencoding::encode(&ids.join(","))
    );
    client
        .invoke_get_file(&format!("Downloading snapshots {}", ids.join(",")), &uri, target)
        .await
}

/// Upload a snapshot file; with a comment, skip when it is already present
pub async fn upload(
    client: &ApplianceClient,
    file: &Path,
    comment: Option<&str>,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if let Some(comment) = comment {
        if !opts.force && search(client, comment).await?.is_some() {
            return Ok(ApiResponse::skipped(format!("Snapshot '{}' already uploaded", comment)));
        }
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let fields: Vec<(String, String)> = comment
        .map(|c| vec![("comment".to_string(), c.to_string())])
        .unwrap_or_default();
    client
        .invoke_post_files(
            &format!("Uploading snapshot {}", file.display()),
            &endpoint()?.collection_uri()?,
            &[UploadFile::new("uploadedfile", file)],
            &fields,
            opts.ignore_error,
        )
        .await
}

/// Apply a snapshot; this always changes the appliance
pub async fn apply(client: &ApplianceClient, id: &str, opts: CallOptions) -> Result<ApiResponse> {
    if !exists_by_id(client, id).await? {
        return Ok(ApiResponse::skipped(format!("Snapshot {} does not exist", id)));
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let uri = format!("{}/apply/{}", endpoint()?.collection_uri()?, urlencoding::encode(id));
    client
        .invoke_post(
            &format!("Applying snapshot {}", id),
            &uri,
            &json!({ "snapshot_id": id }),
            opts.ignore_error,
        )
        .await
}

/// Delete a snapshot by id
pub async fn delete(client: &ApplianceClient, id: &str, opts: CallOptions) -> Result<ApiResponse> {
    if !exists_by_id(client, id).await? {
        return Ok(ApiResponse::skipped(format!("Snapshot {} does not exist, nothing to delete", id)));
    }
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let uri = format!(
        "{}/multi_destroy?record_ids={}",
        endpoint()?.collection_uri()?,
        urlencoding::encode(id)
    );
    client
        .invoke_delete(&format!("Deleting snapshot {}", id), &uri, opts.ignore_error)
        .await
}
