//! Config registry keyed by `(group, name)`.
//!
//! Schemas are registered explicitly: whoever builds the store calls the
//! registration functions it wants, in the order it wants. Registering the
//! same `(group, name)` twice replaces the earlier entry.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};

use trainconf_common::{ConfError, ConfigNode, Result};

/// A typed record that can be registered and instantiated.
///
/// The default value is the schema: its serialized form lists every
/// recognised key together with its default.
pub trait ConfigSchema: Serialize + DeserializeOwned + Default {
    /// Group the schema is stored under (`/` separates nested groups).
    const GROUP: &'static str;
    /// Name of the entry within its group.
    const NAME: &'static str;

    /// Node holding the defaults.
    fn schema_node() -> Result<ConfigNode> {
        ConfigNode::from_serialize(&Self::default())
    }
}

/// One registered config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub group: String,
    pub name: String,
    pub node: ConfigNode,
    /// Rust type the node came from, when registered through a schema.
    pub type_name: Option<&'static str>,
}

/// Registry of config nodes.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    groups: BTreeMap<String, BTreeMap<String, ConfigEntry>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node` as `group/name`, returning the entry it replaced.
    pub fn store(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        node: ConfigNode,
    ) -> Option<ConfigEntry> {
        self.insert(ConfigEntry {
            group: group.into(),
            name: name.into(),
            node,
            type_name: None,
        })
    }

    /// Store the defaults of `S` as `S::GROUP/S::NAME`.
    pub fn store_schema<S: ConfigSchema>(&mut self) -> Result<Option<ConfigEntry>> {
        let node = S::schema_node()?;
        Ok(self.insert(ConfigEntry {
            group: S::GROUP.to_string(),
            name: S::NAME.to_string(),
            node,
            type_name: Some(std::any::type_name::<S>()),
        }))
    }

    /// Store any serializable value (e.g. a preset of a schema) as `group/name`.
    pub fn store_value<T: Serialize>(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Option<ConfigEntry>> {
        let node = ConfigNode::from_serialize(value)?;
        Ok(self.insert(ConfigEntry {
            group: group.into(),
            name: name.into(),
            node,
            type_name: Some(std::any::type_name::<T>()),
        }))
    }

    fn insert(&mut self, entry: ConfigEntry) -> Option<ConfigEntry> {
        let group = entry.group.clone();
        let name = entry.name.clone();
        let previous = self
            .groups
            .entry(group.clone())
            .or_default()
            .insert(name.clone(), entry);
        if previous.is_some() {
            tracing::warn!(%group, %name, "Replacing registered config");
        } else {
            tracing::info!(%group, %name, "Registered config");
        }
        previous
    }

    pub fn get(&self, group: &str, name: &str) -> Option<&ConfigEntry> {
        self.groups.get(group)?.get(name)
    }

    /// Like [`get`](Self::get), but a missing entry is an error.
    pub fn load(&self, group: &str, name: &str) -> Result<&ConfigEntry> {
        self.get(group, name).ok_or_else(|| ConfError::NotFound {
            group: group.to_string(),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.get(group, name).is_some()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Group names, sorted.
    pub fn groups(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Entry names within `group`, sorted. Empty for an unknown group.
    pub fn names(&self, group: &str) -> Vec<&str> {
        self.groups
            .get(group)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every entry, ordered by group then name.
    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.groups.values().flat_map(|names| names.values())
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a group's node sits in the composed tree: `a/b` → `a.b`.
pub fn package_of(group: &str) -> String {
    group.replace('/', ".")
}
