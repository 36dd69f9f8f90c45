//! SSL certificate databases and their certificates

use crate::appliance::{ApiResponse, ApplianceClient, UploadFile};
use crate::resource::operations::{self, CallOptions};
use crate::resource::{Endpoint, PathParams};
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;

/// Which certificate list inside a database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertKind {
    Signer,
    Personal,
}

impl CertKind {
    fn resource_key(self) -> &'static str {
        match self {
            CertKind::Signer => "signer-certificates",
            CertKind::Personal => "personal-certificates",
        }
    }
}

impl std::str::FromStr for CertKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "signer" => Ok(CertKind::Signer),
            "personal" => Ok(CertKind::Personal),
            _ => Err(anyhow::anyhow!("Unknown certificate kind: {} (expected signer or personal)", s)),
        }
    }
}

fn endpoint(kind: CertKind, kdb_id: &str) -> Result<Endpoint<'static>> {
    Endpoint::lookup(kind.resource_key(), PathParams::new().with("kdb_id", kdb_id))
}

fn label_key(label: &str) -> Map<String, Value> {
    let mut key = Map::new();
    key.insert("label".into(), label.into());
    key
}

/// List certificate databases
pub async fn get_databases(client: &ApplianceClient) -> Result<ApiResponse> {
    let endpoint = Endpoint::lookup("certificate-databases", PathParams::new())?;
    operations::get_all(client, &endpoint, CallOptions::default()).await
}

/// List certificates of one kind in a database
pub async fn get_all(client: &ApplianceClient, kind: CertKind, kdb_id: &str) -> Result<ApiResponse> {
    operations::get_all(client, &endpoint(kind, kdb_id)?, CallOptions::default()).await
}

/// Whether a certificate with this label is present
pub async fn exists(client: &ApplianceClient, kind: CertKind, kdb_id: &str, label: &str) -> Result<bool> {
    let found = operations::find(client, &endpoint(kind, kdb_id)?, &label_key(label)).await?;
    Ok(found.is_some())
}

/// Import a certificate file under `label`, unless the label is taken
///
/// Personal certificates are PKCS#12 files and usually need `password`.
pub async fn import(
    client: &ApplianceClient,
    kind: CertKind,
    kdb_id: &str,
    label: &str,
    cert_file: &Path,
    password: Option<&str>,
    opts: CallOptions,
) -> Result<ApiResponse> {
    let endpoint = endpoint(kind, kdb_id)?;
    if let Some(skipped) = operations::gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    if !opts.force && exists(client, kind, kdb_id, label).await? {
        return Ok(ApiResponse::skipped(format!(
            "Certificate '{}' already exists in {}",
            label, kdb_id
        )));
    }

    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let mut fields = vec![
        ("operation".to_string(), "import".to_string()),
        ("label".to_string(), label.to_string()),
    ];
    if let Some(password) = password {
        fields.push(("password".to_string(), password.to_string()));
    }
    let files = [UploadFile::new("cert", cert_file)];

    client
        .invoke_post_files(
            &format!("Importing certificate '{}' into {}", label, kdb_id),
            &endpoint.collection_uri()?,
            &files,
            &fields,
            opts.ignore_error,
        )
        .await
}

/// Delete a certificate by label
pub async fn delete(
    client: &ApplianceClient,
    kind: CertKind,
    kdb_id: &str,
    label: &str,
    opts: CallOptions,
) -> Result<ApiResponse> {
    let key = Value::Object(label_key(label));
    operations::delete(client, &endpoint(kind, kdb_id)?, &key, opts).await
}

/// Export a certificate to a local file
pub async fn export(
    client: &ApplianceClient,
    kind: CertKind,
    kdb_id: &str,
    label: &str,
    target: &Path,
) -> Result<ApiResponse> {
    let endpoint = endpoint(kind, kdb_id)?;
    if let Some(skipped) = operations::gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let Some(current) = operations::find(client, &endpoint, &label_key(label)).await? else {
        return Ok(ApiResponse::skipped(format!(
            "Certificate '{}' does not exist in {}",
            label, kdb_id
        )));
    };
    let id = operations::object_id(&current, endpoint.def).unwrap_or_else(|| label.to_string());

    let uri = format!("{}?export", endpoint.item_uri(&id)?);
    client
        .invoke_get_file(&format!("Exporting certificate '{}'", label), &uri, target)
        .await
}
