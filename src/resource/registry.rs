//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all appliance resource definitions from embedded JSON
//! files and provides lookup functions for the rest of the crate.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/system.json"),
    include_str!("../resources/wga.json"),
    include_str!("../resources/aac.json"),
    include_str!("../resources/ssl.json"),
];

/// Shape of the resource on the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A list of objects addressed by id
    #[default]
    Collection,
    /// A single settings document read and replaced in place
    Singleton,
}

/// HTTP verb used for updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Put,
    Post,
}

/// What body an update sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePayload {
    /// Only the fields the caller supplied
    #[default]
    Desired,
    /// The current object with the supplied fields laid over it
    Merge,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Grouping shown by the `resources` command
    pub service: String,
    #[serde(default)]
    pub kind: ResourceKind,
    /// Collection (or singleton) URI template
    pub uri: String,
    /// Item URI template, `{collection}/{id}` when absent
    #[serde(default)]
    pub item_uri: Option<String>,
    /// Dot path to the item list inside a GET response, empty for a bare array
    #[serde(default)]
    pub response_path: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Fields that together identify an object; defaults to `id_field`
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub update_method: UpdateMethod,
    #[serde(default)]
    pub update_payload: UpdatePayload,
    /// Fields stripped before comparing (ids, timestamps)
    #[serde(default)]
    pub volatile_fields: Vec<String>,
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub required_modules: Vec<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl ResourceDef {
    /// Fields used by `search`
    pub fn key_fields(&self) -> Vec<&str> {
        if self.search_fields.is_empty() {
            vec![self.id_field.as_str()]
        } else {
            self.search_fields.iter().map(String::as_str).collect()
        }
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Resource keys belonging to one service
pub fn get_service_resource_keys(service: &str) -> Vec<&'static str> {
    get_all_resource_keys()
        .into_iter()
        .filter(|k| get_resource(k).map(|r| r.service == service).unwrap_or(false))
        .collect()
}
