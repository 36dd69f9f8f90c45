//! Generic resource operations
//!
//! `get_all`, `get`, `search`, `add`, `update`, `delete`, `set` and `compare`
//! for any registry resource. Mutating calls run a fetch-compare-act check
//! first and only reach the appliance when the desired state differs.

use super::endpoint::Endpoint;
use super::registry::{ResourceDef, UpdateMethod, UpdatePayload};
use crate::appliance::{ApiResponse, ApplianceClient, ApplianceError};
use crate::compare::{diff_keyed, format_summary, json_compare, json_sort, project_onto, without_keys};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

/// Keys that never carry configuration meaning
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &[
    "id",
    "uuid",
    "lastModified",
    "lastmodified",
    "last_modified",
    "datecreated",
    "dateCreated",
    "created",
    "timestamp",
];

/// Flags shared by every operation
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Report what would change without calling mutating endpoints
    pub check_mode: bool,
    /// Skip the idempotency check and always issue the mutating call
    pub force: bool,
    /// Return HTTP failures as `rc` instead of an error
    pub ignore_error: bool,
}

impl CallOptions {
    pub fn check() -> Self {
        Self {
            check_mode: true,
            ..Self::default()
        }
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Skip the call with a warning when the appliance cannot serve this resource
pub async fn gate(client: &ApplianceClient, def: &ResourceDef) -> Result<Option<ApiResponse>> {
    let warning = client
        .check_requirements(def.min_version.as_deref(), &def.required_modules)
        .await?;
    Ok(warning.map(ApiResponse::skipped))
}

/// Retrieve every object of a collection, or the singleton document
pub async fn get_all(client: &ApplianceClient, endpoint: &Endpoint<'_>, opts: CallOptions) -> Result<ApiResponse> {
    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let uri = endpoint.collection_uri()?;
    let mut response = client
        .invoke_get(&format!("Retrieving {}", endpoint.describe()), &uri, opts.ignore_error)
        .await?;

    if response.is_success() && !endpoint.is_singleton() {
        response.data = Value::Array(extract_items(&response.data, &endpoint.def.response_path));
    }
    Ok(response)
}

/// Retrieve one object by id (singletons ignore the id)
pub async fn get(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    id: Option<&str>,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if endpoint.is_singleton() {
        return get_all(client, endpoint, opts).await;
    }

    let Some(id) = id else {
        anyhow::bail!("{} requires an id", endpoint.describe());
    };

    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let uri = endpoint.item_uri(id)?;
    client
        .invoke_get(
            &format!("Retrieving {} '{}'", endpoint.describe(), id),
            &uri,
            opts.ignore_error,
        )
        .await
}

/// Find the object matching `key` and return it
pub async fn find(client: &ApplianceClient, endpoint: &Endpoint<'_>, key: &Map<String, Value>) -> Result<Option<Value>> {
    let all = get_all(client, endpoint, CallOptions::default()).await?;
    let Some(items) = all.data.as_array() else {
        return Ok(None);
    };

    Ok(items.iter().find(|item| matches_key(item, key)).cloned())
}

/// Search a collection for `key` and return the object's identifier
pub async fn search(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    key: &Map<String, Value>,
) -> Result<Option<String>> {
    let found = find(client, endpoint, key).await?;
    Ok(found.and_then(|item| object_id(&item, endpoint.def)))
}

// =============================================================================
// Writes
// =============================================================================

/// Create an object, unless one with the same key already exists
pub async fn add(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    body: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if endpoint.is_singleton() {
        return Err(unsupported("add", endpoint));
    }
    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    if !opts.force {
        let key = search_key(endpoint.def, body)?;
        if find(client, endpoint, &key).await?.is_some() {
            return Ok(ApiResponse::skipped(format!(
                "{} {} already exists",
                endpoint.describe(),
                Value::Object(key)
            )));
        }
    }

    create(client, endpoint, body, opts).await
}

/// Update an existing object when it differs from `body`
pub async fn update(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    body: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let current = if endpoint.is_singleton() {
        get_all(client, endpoint, CallOptions::default()).await?.data
    } else {
        let key = search_key(endpoint.def, body)?;
        match find(client, endpoint, &key).await? {
            Some(current) => current,
            None => {
                return Ok(ApiResponse::skipped(format!(
                    "{} {} does not exist, cannot update",
                    endpoint.describe(),
                    Value::Object(key)
                )));
            },
        }
    };

    apply_update(client, endpoint, &current, body, opts).await
}

/// Delete the object matching `key`; a missing object is not an error
pub async fn delete(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    key: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if endpoint.is_singleton() {
        return Err(unsupported("delete", endpoint));
    }
    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let key = search_key(endpoint.def, key)?;
    let Some(current) = find(client, endpoint, &key).await? else {
        return Ok(ApiResponse::skipped(format!(
            "{} {} does not exist, nothing to delete",
            endpoint.describe(),
            Value::Object(key)
        )));
    };

    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let id = object_id(&current, endpoint.def)
        .with_context(|| format!("{} has no '{}' field", endpoint.describe(), endpoint.def.id_field))?;
    let uri = endpoint.item_uri(&id)?;
    client
        .invoke_delete(
            &format!("Deleting {} '{}'", endpoint.describe(), id),
            &uri,
            opts.ignore_error,
        )
        .await
}

/// Create or update so that the appliance matches `body`
pub async fn set(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    body: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if endpoint.is_singleton() {
        return update(client, endpoint, body, opts).await;
    }
    if let Some(skipped) = gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let key = search_key(endpoint.def, body)?;
    match find(client, endpoint, &key).await? {
        Some(current) => apply_update(client, endpoint, &current, body, opts).await,
        None => create(client, endpoint, body, opts).await,
    }
}

async fn create(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    body: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let uri = endpoint.collection_uri()?;
    client
        .invoke_post(&format!("Creating {}", endpoint.describe()), &uri, body, opts.ignore_error)
        .await
}

async fn apply_update(
    client: &ApplianceClient,
    endpoint: &Endpoint<'_>,
    current: &Value,
    desired: &Value,
    opts: CallOptions,
) -> Result<ApiResponse> {
    if !opts.force && !needs_update(endpoint.def, current, desired) {
        tracing::info!("{} already up to date", endpoint.describe());
        return Ok(ApiResponse::unchanged());
    }

    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let payload = match endpoint.def.update_payload {
        UpdatePayload::Desired => desired.clone(),
        UpdatePayload::Merge => merge(current, desired),
    };

    let description = format!("Updating {}", endpoint.describe());
    if endpoint.is_singleton() {
        let uri = endpoint.collection_uri()?;
        return client.invoke_put(&description, &uri, &payload, opts.ignore_error).await;
    }

    match endpoint.def.update_method {
        UpdateMethod::Put => {
            let id = object_id(current, endpoint.def)
                .with_context(|| format!("{} has no '{}' field", endpoint.describe(), endpoint.def.id_field))?;
            let uri = endpoint.item_uri(&id)?;
            client.invoke_put(&description, &uri, &payload, opts.ignore_error).await
        },
        UpdateMethod::Post => {
            let uri = endpoint.collection_uri()?;
            client.invoke_post(&description, &uri, &payload, opts.ignore_error).await
        },
    }
}

// =============================================================================
// Drift detection
// =============================================================================

/// Compare the same resource on two appliances
///
/// `data` holds `matches`, the list of `differences` and a one-line `summary`.
/// When either appliance cannot serve the resource, `data` stays empty and
/// the skip warnings are returned without a verdict.
pub async fn compare(
    left: &ApplianceClient,
    right: &ApplianceClient,
    endpoint: &Endpoint<'_>,
) -> Result<ApiResponse> {
    let (left_gate, right_gate) = futures::try_join!(gate(left, endpoint.def), gate(right, endpoint.def))?;
    if left_gate.is_some() || right_gate.is_some() {
        let warnings = left_gate
            .into_iter()
            .chain(right_gate)
            .flat_map(|skipped| skipped.warnings)
            .collect();
        return Ok(ApiResponse::new(json!({}), false, warnings));
    }

    let (left_response, right_response) = futures::try_join!(
        get_all(left, endpoint, CallOptions::default()),
        get_all(right, endpoint, CallOptions::default()),
    )?;

    let mut warnings = left_response.warnings.clone();
    warnings.extend(right_response.warnings.iter().cloned());

    let ignore = comparison_ignores(endpoint.def);
    let left_canonical = json_sort(&without_keys(&left_response.data, &ignore));
    let right_canonical = json_sort(&without_keys(&right_response.data, &ignore));

    let keys = if endpoint.is_singleton() {
        Vec::new()
    } else {
        endpoint.def.key_fields()
    };
    let differences = diff_keyed(&left_canonical, &right_canonical, &keys);
    tracing::info!(
        "Compared {} between {} and {}: {}",
        endpoint.describe(),
        left.base_url(),
        right.base_url(),
        format_summary(&differences)
    );

    let data = json!({
        "matches": differences.is_empty(),
        "differences": differences,
        "summary": format_summary(&differences),
    });
    Ok(ApiResponse::new(data, false, warnings))
}

// =============================================================================
// Helpers
// =============================================================================

/// Fields removed from both sides before comparing
///
/// The resource's own key fields always stay, they identify the object.
pub fn comparison_ignores(def: &ResourceDef) -> Vec<String> {
    let keys = def.key_fields();
    DEFAULT_VOLATILE_FIELDS
        .iter()
        .map(|f| f.to_string())
        .chain(def.volatile_fields.iter().cloned())
        .filter(|f| !keys.contains(&f.as_str()))
        .collect()
}

/// Whether `current` must change to become `desired`
pub fn needs_update(def: &ResourceDef, current: &Value, desired: &Value) -> bool {
    let ignore = comparison_ignores(def);
    let current = without_keys(&project_onto(current, desired), &ignore);
    let desired = without_keys(desired, &ignore);
    !json_compare(&current, &desired)
}

/// Lay `desired`'s top-level fields over `current`
pub fn merge(current: &Value, desired: &Value) -> Value {
    match (current, desired) {
        (Value::Object(cur), Value::Object(want)) => {
            let mut merged = cur.clone();
            for (k, v) in want {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        },
        _ => desired.clone(),
    }
}

/// Pull the key fields out of a document
pub fn search_key(def: &ResourceDef, document: &Value) -> Result<Map<String, Value>> {
    let mut key = Map::new();
    for field in def.key_fields() {
        let Some(value) = document.get(field) else {
            anyhow::bail!("Missing key field '{}' for {}", field, def.display_name);
        };
        key.insert(field.to_string(), value.clone());
    }
    Ok(key)
}

/// Build a key document from a single value, for resources keyed by one field
pub fn key_from_str(def: &ResourceDef, value: &str) -> Result<Value> {
    let fields = def.key_fields();
    if fields.len() != 1 {
        anyhow::bail!(
            "{} is identified by {} fields ({}); supply them as a document",
            def.display_name,
            fields.len(),
            fields.join(", ")
        );
    }
    let mut key = Map::new();
    key.insert(fields[0].to_string(), Value::String(value.to_string()));
    Ok(Value::Object(key))
}

/// Identifier of an object, numbers rendered as text
pub fn object_id(item: &Value, def: &ResourceDef) -> Option<String> {
    match item.get(&def.id_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Search matching is lenient about `80` vs `"80"`, unlike the idempotency check
fn matches_key(item: &Value, key: &Map<String, Value>) -> bool {
    key.iter().all(|(field, wanted)| match item.get(field) {
        Some(actual) => actual == wanted || value_text(actual) == value_text(wanted),
        None => false,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract items from a response using a dot path
pub fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return match response {
            Value::Array(arr) => arr.clone(),
            Value::Null => vec![],
            other => vec![other.clone()],
        };
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}

fn unsupported(operation: &str, endpoint: &Endpoint<'_>) -> anyhow::Error {
    ApplianceError::Unsupported {
        operation: operation.to_string(),
        resource: endpoint.describe(),
    }
    .into()
}
