//! File formats: YAML and JSON, picked by extension.

use std::path::Path;

use serde_json::Value;

use crate::error::{ConfError, Result};
use crate::node::ConfigNode;

/// On-disk config format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.yaml` / `.yml` → YAML, `.json` → JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse text in this format.
    pub fn parse(self, text: &str, path: &Path) -> Result<ConfigNode> {
        let value: Value = match self {
            Self::Yaml => yaml_to_value(text).map_err(|message| ConfError::Parse {
                path: path.to_path_buf(),
                message,
            })?,
            Self::Json => serde_json::from_str(text).map_err(|e| ConfError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
        };
        // An empty YAML document is an empty mapping, not null.
        Ok(match value {
            Value::Null => ConfigNode::mapping(),
            other => ConfigNode::from(other),
        })
    }

    /// Render a node in this format.
    pub fn render(self, node: &ConfigNode) -> Result<String> {
        match self {
            Self::Yaml => node.to_yaml(),
            Self::Json => node.to_json_pretty(),
        }
    }
}

/// Read YAML text into the JSON value model used by [`ConfigNode`].
///
/// Integer and boolean mapping keys become strings (`{0: 8}` → `{"0": 8}`),
/// non-finite floats become `"inf"`, `"-inf"` or `"nan"`, and blank text is
/// `null`.
pub fn yaml_to_value(text: &str) -> std::result::Result<Value, String> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    convert_yaml(yaml)
}

fn convert_yaml(yaml: serde_yaml::Value) -> std::result::Result<Value, String> {
    use serde_yaml::Value as Y;
    Ok(match yaml {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                match serde_json::Number::from_f64(f) {
                    Some(num) => Value::Number(num),
                    None if f.is_nan() => Value::String("nan".into()),
                    None if f > 0.0 => Value::String("inf".into()),
                    None => Value::String("-inf".into()),
                }
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(convert_yaml)
                .collect::<std::result::Result<_, _>>()?,
        ),
        Y::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    Y::String(s) => s,
                    Y::Bool(b) => b.to_string(),
                    Y::Number(n) => n.to_string(),
                    other => return Err(format!("unsupported mapping key {other:?}")),
                };
                out.insert(key, convert_yaml(value)?);
            }
            Value::Object(out)
        }
        Y::Tagged(tagged) => convert_yaml(tagged.value)?,
    })
}

/// Load a config file into a node.
pub fn load_node(path: &Path) -> Result<ConfigNode> {
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfError::io(format!("read {}", path.display()), e))?;
    let node = format.parse(&text, path)?;
    tracing::debug!(path = %path.display(), ?format, "Loaded config file");
    Ok(node)
}

/// Write a node to a config file; the format follows the extension.
pub fn save_node(node: &ConfigNode, path: &Path) -> Result<()> {
    let format = ConfigFormat::from_path(path)?;
    let text = format.render(node)?;
    std::fs::write(path, text)
        .map_err(|e| ConfError::io(format!("write {}", path.display()), e))?;
    tracing::debug!(path = %path.display(), ?format, "Saved config file");
    Ok(())
}
