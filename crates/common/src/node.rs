//! Config node tree.
//!
//! Every format (YAML file, JSON file, command-line override, typed record)
//! is brought into a [`ConfigNode`] before composition. The tree is a
//! `serde_json::Value`; keys are addressed with dotted paths such as
//! `trainer.max_steps`.

use std::collections::BTreeSet;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfError, Result};

/// How [`ConfigNode::set`] treats the target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// The key must already exist (`key=value`).
    Existing,
    /// The key must not exist yet (`+key=value`).
    New,
    /// Add or replace (`++key=value`).
    Upsert,
}

/// A configuration tree with dotted-path access.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode(Value);

impl Default for ConfigNode {
    fn default() -> Self {
        Self::mapping()
    }
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl ConfigNode {
    /// An empty mapping.
    pub fn mapping() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Serialize a typed value (usually a schema's defaults) into a node.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| ConfError::Serialization {
                message: e.to_string(),
            })
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_mapping(&self) -> bool {
        self.0.is_object()
    }

    /// Look up a dotted path. The empty path is the root.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.0);
        }
        path.split('.')
            .try_fold(&self.0, |cur, key| cur.as_object()?.get(key))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set the value at `path`. Intermediate mappings are created only for
    /// [`SetMode::New`] and [`SetMode::Upsert`].
    pub fn set(&mut self, path: &str, value: Value, mode: SetMode) -> Result<()> {
        let segments = split_path(path)?;
        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(invalid_path(path)),
        };
        let create = mode != SetMode::Existing;
        let parent = self.mapping_at_mut(parents, create)?;
        match (mode, parent.contains_key(*leaf)) {
            (SetMode::Existing, false) => Err(ConfError::UnknownKey {
                path: path.to_string(),
            }),
            (SetMode::New, true) => Err(ConfError::KeyExists {
                path: path.to_string(),
            }),
            _ => {
                parent.insert((*leaf).to_string(), value);
                Ok(())
            }
        }
    }

    /// Remove the key at `path`, returning its value.
    pub fn remove(&mut self, path: &str) -> Result<Value> {
        let segments = split_path(path)?;
        let missing = || ConfError::MissingKey {
            path: path.to_string(),
        };
        let (leaf, parents) = segments.split_last().ok_or_else(|| invalid_path(path))?;
        let parent = self.mapping_at_mut(parents, false).map_err(|e| match e {
            ConfError::UnknownKey { .. } => missing(),
            other => other,
        })?;
        parent.remove(*leaf).ok_or_else(missing)
    }

    /// Recursively merge `overlay` into this node.
    ///
    /// Mappings merge key by key; any other value replaces what was there.
    /// With `strict`, keys absent from this node are rejected.
    pub fn merge(&mut self, overlay: &Value, strict: bool) -> Result<()> {
        merge_value(&mut self.0, overlay, "", strict)
    }

    /// Merge `overlay` below `prefix` (dotted path to an existing mapping).
    pub fn merge_at(&mut self, prefix: &str, overlay: &Value, strict: bool) -> Result<()> {
        if prefix.is_empty() {
            return self.merge(overlay, strict);
        }
        let segments = split_path(prefix)?;
        let target = self.mapping_at_mut(&segments, !strict)?;
        let mut slot = Value::Object(std::mem::take(target));
        let merged = merge_value(&mut slot, overlay, prefix, strict);
        if let Value::Object(map) = slot {
            *target = map;
        }
        merged
    }

    /// Clone the sub-tree at `path`.
    pub fn section(&self, path: &str) -> Result<ConfigNode> {
        self.get(path)
            .cloned()
            .map(Self)
            .ok_or_else(|| ConfError::MissingKey {
                path: path.to_string(),
            })
    }

    /// Convert the whole node into a typed value.
    pub fn to<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone()).map_err(|e| ConfError::Instantiate {
            path: "<root>".to_string(),
            message: e.to_string(),
        })
    }

    /// Convert the sub-tree at `path` into a typed value.
    pub fn section_to<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path).ok_or_else(|| ConfError::MissingKey {
            path: path.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| ConfError::Instantiate {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Sorted dotted paths of every leaf that differs between the two trees.
    /// A key present on one side only counts as a difference.
    pub fn diff(&self, other: &ConfigNode) -> Vec<String> {
        let mut out = Vec::new();
        diff_value(&self.0, &other.0, "", &mut out);
        out.sort();
        out
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.0).map_err(|e| ConfError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.0).map_err(|e| ConfError::Serialization {
            message: e.to_string(),
        })
    }

    fn mapping_at_mut(&mut self, segments: &[&str], create: bool) -> Result<&mut Map<String, Value>> {
        let mut cur = &mut self.0;
        for (i, key) in segments.iter().enumerate() {
            let map = as_mapping_mut(cur, &segments[..i].join("."), create)?;
            cur = if create {
                map.entry((*key).to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
            } else {
                map.get_mut(*key).ok_or_else(|| ConfError::UnknownKey {
                    path: segments[..=i].join("."),
                })?
            };
        }
        as_mapping_mut(cur, &segments.join("."), create)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Split a dotted path, rejecting empty segments.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(invalid_path(path));
    }
    Ok(segments)
}

fn invalid_path(path: &str) -> ConfError {
    ConfError::InvalidValue {
        field: path.to_string(),
        message: "key path has an empty segment".to_string(),
    }
}

fn as_mapping_mut<'a>(
    value: &'a mut Value,
    path: &str,
    create: bool,
) -> Result<&'a mut Map<String, Value>> {
    if create && value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfError::NotAMapping {
            path: display_path(path),
        }),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

fn merge_value(base: &mut Value, overlay: &Value, path: &str, strict: bool) -> Result<()> {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let child = join(path, key);
                match base.get_mut(key) {
                    Some(slot) => merge_value(slot, value, &child, strict)?,
                    None if strict => return Err(ConfError::UnknownKey { path: child }),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
            Ok(())
        }
        (slot, value) => {
            *slot = value.clone();
            Ok(())
        }
    }
}

fn diff_value(a: &Value, b: &Value, path: &str, out: &mut Vec<String>) {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let keys: BTreeSet<&String> = x.keys().chain(y.keys()).collect();
            for key in keys {
                let child = join(path, key);
                match (x.get(key), y.get(key)) {
                    (Some(va), Some(vb)) => diff_value(va, vb, &child, out),
                    _ => out.push(child),
                }
            }
        }
        _ if a != b => out.push(display_path(path)),
        _ => {}
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConfigNode {
        ConfigNode::from(json!({
            "trainer": {
                "max_steps": -1,
                "precision": 32,
                "max_time": null,
            }
        }))
    }

    #[test]
    fn get_walks_dotted_paths() {
        let node = sample();
        assert_eq!(node.get("trainer.precision"), Some(&json!(32)));
        assert!(node.get("trainer.missing").is_none());
        assert!(node.get("trainer.precision.bits").is_none());
        assert_eq!(node.get(""), Some(node.as_value()));
    }

    #[test]
    fn set_existing_rejects_unknown_keys() {
        let mut node = sample();
        node.set("trainer.max_steps", json!(500), SetMode::Existing)
            .unwrap();
        assert_eq!(node.get("trainer.max_steps"), Some(&json!(500)));

        let err = node
            .set("trainer.max_stepz", json!(1), SetMode::Existing)
            .unwrap_err();
        assert!(matches!(err, ConfError::UnknownKey { path } if path == "trainer.max_stepz"));
    }

    #[test]
    fn set_new_and_upsert() {
        let mut node = sample();
        node.set("trainer.extra.depth", json!(3), SetMode::New).unwrap();
        assert_eq!(node.get("trainer.extra.depth"), Some(&json!(3)));

        let err = node
            .set("trainer.precision", json!(16), SetMode::New)
            .unwrap_err();
        assert!(matches!(err, ConfError::KeyExists { .. }));

        node.set("trainer.precision", json!("bf16"), SetMode::Upsert)
            .unwrap();
        assert_eq!(node.get("trainer.precision"), Some(&json!("bf16")));
    }

    #[test]
    fn set_through_null_only_when_creating() {
        let mut node = sample();
        let err = node
            .set("trainer.max_time.days", json!(1), SetMode::Existing)
            .unwrap_err();
        assert!(matches!(err, ConfError::NotAMapping { path } if path == "trainer.max_time"));

        node.set("trainer.max_time.days", json!(1), SetMode::Upsert)
            .unwrap();
        assert_eq!(node.get("trainer.max_time"), Some(&json!({"days": 1})));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut node = sample();
        let err = node
            .set("trainer.precision.bits", json!(1), SetMode::Upsert)
            .unwrap_err();
        assert!(matches!(err, ConfError::NotAMapping { .. }));
    }

    #[test]
    fn empty_segments_are_rejected() {
        let mut node = sample();
        assert!(node.set("trainer..x", json!(1), SetMode::Upsert).is_err());
        assert!(node.set("", json!(1), SetMode::Upsert).is_err());
    }

    #[test]
    fn remove_returns_old_value() {
        let mut node = sample();
        assert_eq!(node.remove("trainer.precision").unwrap(), json!(32));
        assert!(!node.contains("trainer.precision"));
        assert!(matches!(
            node.remove("trainer.precision").unwrap_err(),
            ConfError::MissingKey { .. }
        ));
        assert!(matches!(
            node.remove("nope.precision").unwrap_err(),
            ConfError::MissingKey { .. }
        ));
    }

    #[test]
    fn strict_merge_replaces_leaves_and_rejects_unknown() {
        let mut node = sample();
        node.merge(&json!({"trainer": {"max_time": {"hours": 2}}}), true)
            .unwrap();
        assert_eq!(node.get("trainer.max_time.hours"), Some(&json!(2)));
        assert_eq!(node.get("trainer.precision"), Some(&json!(32)));

        let err = node
            .merge(&json!({"trainer": {"bogus": true}}), true)
            .unwrap_err();
        assert!(matches!(err, ConfError::UnknownKey { path } if path == "trainer.bogus"));

        node.merge(&json!({"trainer": {"bogus": true}}), false)
            .unwrap();
        assert_eq!(node.get("trainer.bogus"), Some(&json!(true)));
    }

    #[test]
    fn merge_at_prefix() {
        let mut node = sample();
        node.merge_at("trainer", &json!({"max_steps": 10}), true)
            .unwrap();
        assert_eq!(node.get("trainer.max_steps"), Some(&json!(10)));

        let err = node
            .merge_at("trainer", &json!({"nope": 1}), true)
            .unwrap_err();
        assert!(matches!(err, ConfError::UnknownKey { path } if path == "trainer.nope"));
    }

    #[test]
    fn diff_reports_changed_and_one_sided_leaves() {
        let base = sample();
        let mut changed = base.clone();
        changed
            .set("trainer.max_steps", json!(500), SetMode::Existing)
            .unwrap();
        changed
            .set("trainer.extra", json!(true), SetMode::New)
            .unwrap();
        assert_eq!(base.diff(&changed), vec!["trainer.extra", "trainer.max_steps"]);
        assert!(base.diff(&base.clone()).is_empty());
    }

    #[test]
    fn section_to_reports_path_on_type_error() {
        let node = sample();
        let steps: i64 = node.section_to("trainer.max_steps").unwrap();
        assert_eq!(steps, -1);

        let err = node.section_to::<bool>("trainer.precision").unwrap_err();
        assert!(matches!(err, ConfError::Instantiate { path, .. } if path == "trainer.precision"));
    }
}
