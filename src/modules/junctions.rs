//! Reverse proxy junctions
//!
//! Junctions are keyed by junction point within a reverse proxy instance.
//! The list call returns only ids, a single junction comes back with server
//! details nested under `servers`, and a changed junction is replaced by
//! re-posting it with `force: yes`.

use crate::appliance::{ApiResponse, ApplianceClient};
use crate::resource::operations::{self, needs_update, CallOptions};
use crate::resource::{Endpoint, PathParams};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const RESOURCE_KEY: &str = "junctions";

/// Desired state of a standard or virtual junction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub junction_point: String,
    /// tcp, ssl, tcpproxy, sslproxy, mutual, local
    pub junction_type: String,
    pub server_hostname: String,
    pub server_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_junction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_path_junction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_http_header: Vec<String>,
    /// Any other junction option, passed through verbatim
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl Junction {
    pub fn new(junction_point: &str, junction_type: &str, server_hostname: &str, server_port: u16) -> Self {
        Self {
            junction_point: junction_point.to_string(),
            junction_type: junction_type.to_string(),
            server_hostname: server_hostname.to_string(),
            server_port,
            virtual_hostname: None,
            stateful_junction: None,
            transparent_path_junction: None,
            basic_auth_mode: None,
            remote_http_header: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The body the appliance expects, yes/no flags included
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("junction_point".into(), self.junction_point.clone().into());
        body.insert("junction_type".into(), self.junction_type.to_lowercase().into());
        body.insert("server_hostname".into(), self.server_hostname.clone().into());
        body.insert("server_port".into(), self.server_port.into());
        if let Some(v) = &self.virtual_hostname {
            body.insert("virtual_hostname".into(), v.clone().into());
        }
        if let Some(v) = self.stateful_junction {
            body.insert("stateful_junction".into(), yes_no(v).into());
        }
        if let Some(v) = self.transparent_path_junction {
            body.insert("transparent_path_junction".into(), yes_no(v).into());
        }
        if let Some(v) = &self.basic_auth_mode {
            body.insert("basic_auth_mode".into(), v.clone().into());
        }
        if !self.remote_http_header.is_empty() {
            body.insert("remote_http_header".into(), self.remote_http_header.clone().into());
        }
        for (k, v) in &self.extra {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn endpoint(instance: &str) -> Result<Endpoint<'static>> {
    Endpoint::lookup(RESOURCE_KEY, PathParams::new().with("instance", instance))
}

/// Reshape a junction as returned by GET into the shape of an add request
///
/// The first server's fields are lifted to the top level and numeric strings
/// become numbers so they compare against typed desired values.
pub fn normalize_current(current: &Value) -> Value {
    let Value::Object(map) = current else {
        return current.clone();
    };

    let mut out = Map::new();
    for (k, v) in map {
        match k.as_str() {
            "id" => {
                out.insert("junction_point".into(), v.clone());
            },
            "type" | "junction_type" => {
                let t = v.as_str().map(|s| s.to_lowercase()).unwrap_or_default();
                out.insert("junction_type".into(), t.into());
            },
            "servers" => {},
            _ => {
                out.insert(k.clone(), v.clone());
            },
        }
    }

    if let Some(server) = map
        .get("servers")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.as_object())
    {
        for (k, v) in server {
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    if let Some(port) = out.get("server_port").and_then(|p| p.as_str()).and_then(|p| p.parse::<u16>().ok()) {
        out.insert("server_port".into(), port.into());
    }

    Value::Object(out)
}

/// List junction points of an instance
pub async fn get_all(client: &ApplianceClient, instance: &str) -> Result<ApiResponse> {
    operations::get_all(client, &endpoint(instance)?, CallOptions::default()).await
}

/// Retrieve one junction
pub async fn get(client: &ApplianceClient, instance: &str, junction_point: &str, opts: CallOptions) -> Result<ApiResponse> {
    operations::get(client, &endpoint(instance)?, Some(junction_point), opts).await
}

/// Whether the instance has this junction point
pub async fn exists(client: &ApplianceClient, instance: &str, junction_point: &str) -> Result<bool> {
    let key = single_key(junction_point);
    Ok(operations::search(client, &endpoint(instance)?, &key).await?.is_some())
}

/// Create the junction, or replace it when its settings differ
pub async fn set(client: &ApplianceClient, instance: &str, junction: &Junction, opts: CallOptions) -> Result<ApiResponse> {
    let endpoint = endpoint(instance)?;
    if let Some(skipped) = operations::gate(client, endpoint.def).await? {
        return Ok(skipped);
    }

    let desired = junction.to_payload();
    let replace = if exists(client, instance, &junction.junction_point).await? {
        let current = get(client, instance, &junction.junction_point, CallOptions::default()).await?;
        let current = normalize_current(&current.data);
        if !opts.force && !needs_update(endpoint.def, &current, &desired) {
            tracing::info!("Junction {} on {} already up to date", junction.junction_point, instance);
            return Ok(ApiResponse::unchanged());
        }
        true
    } else {
        false
    };

    if opts.check_mode {
        return Ok(ApiResponse::would_change());
    }

    let mut body = desired;
    if let Value::Object(map) = &mut body {
        map.insert("force".into(), yes_no(replace).into());
    }

    let verb = if replace { "Replacing" } else { "Creating" };
    client
        .invoke_post(
            &format!("{} junction {} on {}", verb, junction.junction_point, instance),
            &endpoint.collection_uri()?,
            &body,
            opts.ignore_error,
        )
        .await
}

/// Remove a junction; a missing junction only produces a warning
pub async fn delete(client: &ApplianceClient, instance: &str, junction_point: &str, opts: CallOptions) -> Result<ApiResponse> {
    let key = Value::Object(single_key(junction_point));
    operations::delete(client, &endpoint(instance)?, &key, opts).await
}

fn single_key(junction_point: &str) -> Map<String, Value> {
    let mut key = Map::new();
    key.insert("id".into(), junction_point.into());
    key
}
