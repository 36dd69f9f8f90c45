//! Structural diff of two canonical documents
//!
//! Used by drift detection to tell the operator where two appliances differ.

use super::canonical::Canonical;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single difference at a JSON path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiffEntry {
    /// Present on both sides with different scalar values
    Modified {
        path: String,
        left: String,
        right: String,
    },
    /// Present only on the left side
    OnlyLeft { path: String, value: Value },
    /// Present only on the right side
    OnlyRight { path: String, value: Value },
    /// Present on both sides with different JSON kinds
    Structural { path: String, description: String },
}

impl DiffEntry {
    pub fn path(&self) -> &str {
        match self {
            DiffEntry::Modified { path, .. }
            | DiffEntry::OnlyLeft { path, .. }
            | DiffEntry::OnlyRight { path, .. }
            | DiffEntry::Structural { path, .. } => path,
        }
    }
}

/// Diff two canonical values; an empty result means they are equal
pub fn diff(left: &Canonical, right: &Canonical) -> Vec<DiffEntry> {
    diff_keyed(left, right, &[])
}

/// Diff two canonical values, matching objects of the top-level list by `key_fields`
///
/// Items equal on both sides are paired first, wherever they sit, so one
/// inserted item is reported once rather than shifting every later index.
/// Remaining objects of the top-level list pair up when all key fields agree;
/// remaining items of other lists pair up in order.
pub fn diff_keyed(left: &Canonical, right: &Canonical, key_fields: &[&str]) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    diff_value(left.as_value(), right.as_value(), "$", key_fields, &mut out);
    out
}

fn diff_value(left: &Value, right: &Value, path: &str, keys: &[&str], out: &mut Vec<DiffEntry>) {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, lv) in l {
                let child = format!("{}.{}", path, key);
                match r.get(key) {
                    Some(rv) => diff_value(lv, rv, &child, &[], out),
                    None => out.push(DiffEntry::OnlyLeft {
                        path: child,
                        value: lv.clone(),
                    }),
                }
            }
            for (key, rv) in r {
                if !l.contains_key(key) {
                    out.push(DiffEntry::OnlyRight {
                        path: format!("{}.{}", path, key),
                        value: rv.clone(),
                    });
                }
            }
        },
        (Value::Array(l), Value::Array(r)) => diff_array(l, r, path, keys, out),
        (l, r) if kind_name(l) != kind_name(r) => out.push(DiffEntry::Structural {
            path: path.to_string(),
            description: format!("type mismatch: left={} right={}", kind_name(l), kind_name(r)),
        }),
        (l, r) => {
            if l != r {
                out.push(DiffEntry::Modified {
                    path: path.to_string(),
                    left: l.to_string(),
                    right: r.to_string(),
                });
            }
        },
    }
}

fn diff_array(l: &[Value], r: &[Value], path: &str, keys: &[&str], out: &mut Vec<DiffEntry>) {
    // partner[i] is the right index paired with left index i
    let mut partner: Vec<Option<usize>> = vec![None; l.len()];
    let mut taken = vec![false; r.len()];

    // Identical items
    for (li, lv) in l.iter().enumerate() {
        if let Some(ri) = (0..r.len()).find(|&ri| !taken[ri] && r[ri] == *lv) {
            partner[li] = Some(ri);
            taken[ri] = true;
        }
    }
    let identical: Vec<bool> = partner.iter().map(Option::is_some).collect();

    // Same identity, different content
    let keyed = !keys.is_empty();
    for li in 0..l.len() {
        if partner[li].is_some() {
            continue;
        }
        let found = if keyed {
            key_of(&l[li], keys).and_then(|key| {
                (0..r.len()).find(|&ri| !taken[ri] && key_of(&r[ri], keys).as_ref() == Some(&key))
            })
        } else {
            (0..r.len()).find(|&ri| !taken[ri])
        };
        if let Some(ri) = found {
            partner[li] = Some(ri);
            taken[ri] = true;
        }
    }

    for (li, lv) in l.iter().enumerate() {
        let child = format!("{}[{}]", path, li);
        match partner[li] {
            Some(_) if identical[li] => {},
            Some(ri) => diff_value(lv, &r[ri], &child, &[], out),
            None => out.push(DiffEntry::OnlyLeft {
                path: child,
                value: lv.clone(),
            }),
        }
    }
    for (ri, rv) in r.iter().enumerate() {
        if !taken[ri] {
            out.push(DiffEntry::OnlyRight {
                path: format!("{}[{}]", path, ri),
                value: rv.clone(),
            });
        }
    }
}

/// Values of the key fields, when the item is an object carrying all of them
fn key_of<'a>(item: &'a Value, keys: &[&str]) -> Option<Vec<&'a Value>> {
    let map = item.as_object()?;
    keys.iter().map(|k| map.get(*k)).collect()
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Format diff entries as plain text
pub fn format_text(entries: &[DiffEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            DiffEntry::Modified { path, left, right } => {
                lines.push(format!("~ {path}"));
                lines.push(format!("  left:  {left}"));
                lines.push(format!("  right: {right}"));
            },
            DiffEntry::OnlyLeft { path, .. } => lines.push(format!("- {path}")),
            DiffEntry::OnlyRight { path, .. } => lines.push(format!("+ {path}")),
            DiffEntry::Structural { path, description } => {
                lines.push(format!("! {path}: {description}"));
            },
        }
    }
    lines.join("\n")
}

/// Format a simple summary of diff counts
pub fn format_summary(entries: &[DiffEntry]) -> String {
    let mut modified = 0;
    let mut only_left = 0;
    let mut only_right = 0;
    let mut structural = 0;

    for entry in entries {
        match entry {
            DiffEntry::Modified { .. } => modified += 1,
            DiffEntry::OnlyLeft { .. } => only_left += 1,
            DiffEntry::OnlyRight { .. } => only_right += 1,
            DiffEntry::Structural { .. } => structural += 1,
        }
    }

    format!("modified={modified} only_left={only_left} only_right={only_right} structural={structural}")
}
