//! URI templates
//!
//! Registry URIs carry `{name}` placeholders. Path parameters fill them in,
//! URL-encoded; `{id}` is reserved for the object identifier.

use super::registry::{ResourceDef, ResourceKind};
use crate::appliance::ApplianceError;
use anyhow::Result;
use std::collections::BTreeMap;

/// Placeholder filled with the object identifier
pub const ID_PLACEHOLDER: &str = "id";

/// Values for URI template placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse `key=value` pairs as given on the command line
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let Some((name, value)) = pair.split_once('=') else {
                anyhow::bail!("Expected name=value, got '{}'", pair);
            };
            params.insert(name.trim(), value.trim());
        }
        Ok(params)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Fill `{name}` placeholders in a template
pub fn expand(template: &str, params: &PathParams, id: Option<&str>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            anyhow::bail!("Unterminated placeholder in {}", template);
        };
        let name = &after[..end];

        let value = if name == ID_PLACEHOLDER {
            id
        } else {
            params.get(name)
        };
        let Some(value) = value else {
            return Err(ApplianceError::MissingParam {
                param: name.to_string(),
                uri: template.to_string(),
            }
            .into());
        };

        out.push_str(&urlencoding::encode(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// A registry resource bound to its path parameters
#[derive(Debug, Clone)]
pub struct Endpoint<'a> {
    pub key: String,
    pub def: &'a ResourceDef,
    pub params: PathParams,
}

impl<'a> Endpoint<'a> {
    pub fn new(key: &str, def: &'a ResourceDef, params: PathParams) -> Self {
        Self {
            key: key.to_string(),
            def,
            params,
        }
    }

    /// Look up a registry resource by key
    pub fn lookup(key: &str, params: PathParams) -> Result<Endpoint<'static>> {
        let Some(def) = super::registry::get_resource(key) else {
            return Err(ApplianceError::UnknownResource(key.to_string()).into());
        };
        Ok(Endpoint::new(key, def, params))
    }

    pub fn is_singleton(&self) -> bool {
        self.def.kind == ResourceKind::Singleton
    }

    /// URI of the collection (or of the singleton itself)
    pub fn collection_uri(&self) -> Result<String> {
        expand(&self.def.uri, &self.params, None)
    }

    /// URI of one object
    pub fn item_uri(&self, id: &str) -> Result<String> {
        match &self.def.item_uri {
            Some(template) => expand(template, &self.params, Some(id)),
            None => {
                let base = self.collection_uri()?;
                Ok(format!("{}/{}", base, urlencoding::encode(id)))
            },
        }
    }

    /// Human readable label for log lines
    pub fn describe(&self) -> String {
        if self.params.0.is_empty() {
            self.def.display_name.clone()
        } else {
            let params: Vec<String> = self.params.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{} ({})", self.def.display_name, params.join(", "))
        }
    }
}
