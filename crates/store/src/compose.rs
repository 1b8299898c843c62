//! Layered composition.
//!
//! Layers are applied in a fixed order, later layers winning:
//!
//! 1. group selections (`select`, then `group=name` overrides);
//! 2. config files, merged strictly;
//! 3. command-line overrides, in the order given;
//! 4. values set from code.

use std::path::PathBuf;

use serde_json::Value;

use trainconf_common::{
    load_node, parse_overrides, ConfError, ConfigNode, Override, Result, SetMode,
};

use crate::registry::{package_of, ConfigSchema, ConfigStore};

/// Builds a composed config from a [`ConfigStore`] and layered sources.
#[derive(Debug, Clone)]
pub struct Composer<'a> {
    store: &'a ConfigStore,
    selections: Vec<(String, String)>,
    files: Vec<(String, PathBuf)>,
    overrides: Vec<Override>,
    values: Vec<(String, Value)>,
}

impl<'a> Composer<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self {
            store,
            selections: Vec::new(),
            files: Vec::new(),
            overrides: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Use entry `name` for `group`. Selecting a group again replaces the
    /// earlier choice.
    pub fn select(mut self, group: impl Into<String>, name: impl Into<String>) -> Self {
        set_selection(&mut self.selections, group.into(), name.into());
        self
    }

    /// Select the schema's own entry.
    pub fn select_schema<S: ConfigSchema>(self) -> Self {
        self.select(S::GROUP, S::NAME)
    }

    /// Merge a YAML/JSON file at the root of the composed tree.
    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_file_at("", path)
    }

    /// Merge a YAML/JSON file below a dotted prefix (e.g. `trainer`).
    pub fn with_file_at(mut self, prefix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.push((prefix.into(), path.into()));
        self
    }

    pub fn with_override(mut self, ov: Override) -> Self {
        self.overrides.push(ov);
        self
    }

    /// Parse and queue command-line overrides.
    pub fn with_overrides<I, S>(mut self, texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.overrides.extend(parse_overrides(texts)?);
        Ok(self)
    }

    /// Set an existing key from code; applied last.
    pub fn with_value(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((path.into(), value.into()));
        self
    }

    /// The tree holding only the selected entries, before any layer.
    pub fn defaults(&self) -> Result<ConfigNode> {
        let (selections, _) = self.split_overrides();
        self.selected_tree(&selections)
    }

    /// Apply every layer and return the composed tree.
    pub fn compose(&self) -> Result<ConfigNode> {
        let (selections, overrides) = self.split_overrides();
        let mut root = self.selected_tree(&selections)?;

        for (prefix, path) in &self.files {
            let file = load_node(path)?;
            if !file.is_mapping() {
                return Err(ConfError::Parse {
                    path: path.clone(),
                    message: "top level must be a mapping".to_string(),
                });
            }
            root.merge_at(prefix, file.as_value(), true)?;
            tracing::debug!(path = %path.display(), %prefix, "Merged config file");
        }

        for ov in overrides {
            ov.apply(&mut root)?;
            tracing::debug!(%ov, "Applied override");
        }

        for (path, value) in &self.values {
            root.set(path, value.clone(), SetMode::Existing)?;
            tracing::debug!(%path, "Applied code value");
        }

        Ok(root)
    }

    /// Compose and instantiate the section belonging to `S`.
    pub fn instantiate<S: ConfigSchema>(&self) -> Result<S> {
        self.compose()?.section_to(&package_of(S::GROUP))
    }

    /// Pull `group=name` overrides for registered groups out of the override
    /// list and fold them into the selections.
    fn split_overrides(&self) -> (Vec<(String, String)>, Vec<&Override>) {
        let mut selections = self.selections.clone();
        let mut rest = Vec::with_capacity(self.overrides.len());
        for ov in &self.overrides {
            match ov.as_group_selection() {
                Some((group, name)) if self.store.has_group(group) => {
                    set_selection(&mut selections, group.to_string(), name.to_string());
                }
                _ => rest.push(ov),
            }
        }
        (selections, rest)
    }

    /// Parents are placed before nested groups (`loop` before `loop/profiler`)
    /// whatever the selection order, so a child is never overwritten.
    fn selected_tree(&self, selections: &[(String, String)]) -> Result<ConfigNode> {
        let mut ordered: Vec<&(String, String)> = selections.iter().collect();
        ordered.sort_by_key(|(group, _)| group.matches('/').count());

        let mut root = ConfigNode::mapping();
        for (group, name) in ordered {
            let entry = self.store.load(group, name)?;
            root.set(
                &package_of(group),
                entry.node.as_value().clone(),
                SetMode::Upsert,
            )?;
            tracing::debug!(%group, %name, "Selected config");
        }
        Ok(root)
    }
}

fn set_selection(selections: &mut Vec<(String, String)>, group: String, name: String) {
    match selections.iter_mut().find(|(g, _)| *g == group) {
        Some(slot) => slot.1 = name,
        None => selections.push((group, name)),
    }
}
