//! Canonical JSON comparison
//!
//! Two configuration documents are considered equal when they only differ in
//! key order or in the order of sortable lists. Everything else, including
//! `1` vs `"1"` and `null` vs a missing key, counts as a difference so that
//! callers err toward issuing the update.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// A JSON value in canonical form
///
/// Mapping keys are in lexicographic order and every list whose elements
/// share one JSON kind is sorted. Lists mixing kinds keep their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical(Value);

impl Canonical {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonicalize a JSON value
pub fn json_sort(value: &Value) -> Canonical {
    Canonical(canonicalize(value))
}

/// True when both values are equal in canonical form
pub fn json_compare(left: &Value, right: &Value) -> bool {
    json_sort(left) == json_sort(right)
}

/// Like [`json_compare`] after removing the top-level `ignore_keys` from both sides
pub fn json_compare_ignoring(left: &Value, right: &Value, ignore_keys: &[String]) -> bool {
    json_compare(&without_keys(left, ignore_keys), &without_keys(right, ignore_keys))
}

/// Copy of `value` with the named top-level keys removed
///
/// A list is treated as a collection: the keys are removed from each of its
/// objects. Nested documents are left alone, a change below the top level
/// always counts.
pub fn without_keys(value: &Value, keys: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !keys.iter().any(|key| key == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(_) => without_keys(item, keys),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Restrict `current` to the top-level keys present in `desired`
///
/// Keys the caller never asked about cannot cause an update. A key requested
/// in `desired` but missing from `current` stays missing and still compares
/// as a difference.
pub fn project_onto(current: &Value, desired: &Value) -> Value {
    match (current, desired) {
        (Value::Object(cur), Value::Object(want)) => Value::Object(
            cur.iter()
                .filter(|(k, _)| want.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => current.clone(),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonicalize).collect();
            if is_uniform(&items) {
                items.sort_by(compare_same_kind);
            }
            Value::Array(items)
        },
        other => other.clone(),
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

fn kind(value: &Value) -> Kind {
    match value {
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Bool,
        Value::Number(_) => Kind::Number,
        Value::String(_) => Kind::String,
        Value::Array(_) => Kind::Array,
        Value::Object(_) => Kind::Object,
    }
}

fn is_uniform(items: &[Value]) -> bool {
    match items.first() {
        Some(first) => {
            let k = kind(first);
            items.iter().all(|item| kind(item) == k)
        },
        None => true,
    }
}

/// Total order over two canonical values of the same kind
fn compare_same_kind(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let fx = x.as_f64().unwrap_or(0.0);
            let fy = y.as_f64().unwrap_or(0.0);
            // 1 and 1.0 tie numerically; their text keeps the order stable
            fx.total_cmp(&fy).then_with(|| x.to_string().cmp(&y.to_string()))
        },
        // Children are already canonical, so their text is deterministic
        _ => a.to_string().cmp(&b.to_string()),
    }
}
