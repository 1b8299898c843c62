//! Command-line override grammar.
//!
//! | text | effect |
//! |------|--------|
//! | `a.b=v` | set an existing key |
//! | `+a.b=v` | add a key that does not exist yet |
//! | `++a.b=v` | add or replace |
//! | `~a.b` / `~a.b=v` | delete (only if the current value equals `v`) |
//!
//! Values are read as YAML, so `500`, `1.0`, `true`, `null`, `[0, 1]` and
//! `{days: 1}` keep their types. An empty value is the empty string.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{ConfError, Result};
use crate::format::yaml_to_value;
use crate::node::{ConfigNode, SetMode};

/// One parsed override.
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    Set {
        key: String,
        value: Value,
        mode: SetMode,
    },
    Delete {
        key: String,
        expected: Option<Value>,
    },
}

impl Override {
    /// Parse a single override string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('~') {
            let (key, expected) = match rest.split_once('=') {
                Some((key, raw)) => (key, Some(parse_value(text, raw)?)),
                None => (rest, None),
            };
            validate_key(text, key)?;
            return Ok(Self::Delete {
                key: key.to_string(),
                expected,
            });
        }

        let (mode, body) = if let Some(rest) = text.strip_prefix("++") {
            (SetMode::Upsert, rest)
        } else if let Some(rest) = text.strip_prefix('+') {
            (SetMode::New, rest)
        } else {
            (SetMode::Existing, text)
        };
        let (key, raw) = body
            .split_once('=')
            .ok_or_else(|| ConfError::bad_override(text, "expected 'key=value'"))?;
        validate_key(text, key)?;
        Ok(Self::Set {
            key: key.to_string(),
            value: parse_value(text, raw)?,
            mode,
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    /// `group=name` candidates: a plain set of an undotted key to a string.
    /// Whether `group` is really a group is up to the caller.
    pub fn as_group_selection(&self) -> Option<(&str, &str)> {
        match self {
            Self::Set {
                key,
                value: Value::String(name),
                mode: SetMode::Existing,
            } if !key.contains('.') => Some((key.as_str(), name.as_str())),
            _ => None,
        }
    }

    /// Apply to a node.
    pub fn apply(&self, node: &mut ConfigNode) -> Result<()> {
        match self {
            Self::Set { key, value, mode } => node.set(key, value.clone(), *mode),
            Self::Delete { key, expected } => {
                if let Some(expected) = expected {
                    match node.get(key) {
                        Some(current) if current != expected => {
                            return Err(ConfError::bad_override(
                                self.to_string(),
                                format!("current value is {current}"),
                            ));
                        }
                        _ => {}
                    }
                }
                node.remove(key).map(|_| ())
            }
        }
    }
}

impl FromStr for Override {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { key, value, mode } => {
                let prefix = match mode {
                    SetMode::Existing => "",
                    SetMode::New => "+",
                    SetMode::Upsert => "++",
                };
                write!(f, "{prefix}{key}={}", display_value(value))
            }
            Self::Delete {
                key,
                expected: Some(value),
            } => write!(f, "~{key}={}", display_value(value)),
            Self::Delete { key, expected: None } => write!(f, "~{key}"),
        }
    }
}

/// Parse every string in order, stopping at the first bad one.
pub fn parse_overrides<I, S>(texts: I) -> Result<Vec<Override>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .map(|t| Override::parse(t.as_ref()))
        .collect()
}

fn validate_key(text: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ConfError::bad_override(text, "empty key"));
    }
    for segment in key.split('.') {
        if segment.is_empty() {
            return Err(ConfError::bad_override(text, "empty key segment"));
        }
        if let Some(c) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ConfError::bad_override(
                text,
                format!("unexpected character '{c}' in key"),
            ));
        }
    }
    Ok(())
}

fn parse_value(text: &str, raw: &str) -> Result<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Value::String(String::new()));
    }
    yaml_to_value(raw).map_err(|message| ConfError::bad_override(text, message))
}

/// Bare text when it reads back as the same value, JSON text otherwise
/// (`bf16` stays bare, the string `"500"` keeps its quotes).
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) if yaml_to_value(s).ok().as_ref() == Some(value) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_typed_values() {
        let cases = [
            ("trainer.max_steps=500", json!(500)),
            ("trainer.gradient_clip_val=0.5", json!(0.5)),
            ("trainer.benchmark=true", json!(true)),
            ("trainer.min_steps=null", Value::Null),
            ("trainer.devices=[0, 1]", json!([0, 1])),
            ("trainer.max_time={days: 1, hours: 2}", json!({"days": 1, "hours": 2})),
            ("trainer.max_time=00:12:00:00", json!("00:12:00:00")),
            ("trainer.precision='16'", json!("16")),
            ("trainer.accelerator=", json!("")),
        ];
        for (text, expected) in cases {
            match Override::parse(text).unwrap() {
                Override::Set { value, mode, .. } => {
                    assert_eq!(value, expected, "{text}");
                    assert_eq!(mode, SetMode::Existing);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn prefixes_select_mode() {
        let plus = Override::parse("+trainer.extra=1").unwrap();
        assert!(matches!(plus, Override::Set { mode: SetMode::New, .. }));
        let plus2 = Override::parse("++trainer.extra=1").unwrap();
        assert!(matches!(plus2, Override::Set { mode: SetMode::Upsert, .. }));
        assert_eq!(plus2.key(), "trainer.extra");

        let del = Override::parse("~trainer.ipus").unwrap();
        assert_eq!(
            del,
            Override::Delete {
                key: "trainer.ipus".into(),
                expected: None
            }
        );
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["trainer.max_steps", "=5", "trainer..x=1", "trainer.a b=1", "~"] {
            let err = Override::parse(bad).unwrap_err();
            assert!(matches!(err, ConfError::Override { .. }), "{bad}");
        }
    }

    #[test]
    fn group_selection_candidates() {
        let sel = Override::parse("trainer=fast").unwrap();
        assert_eq!(sel.as_group_selection(), Some(("trainer", "fast")));
        assert!(Override::parse("trainer.x=fast")
            .unwrap()
            .as_group_selection()
            .is_none());
        assert!(Override::parse("trainer=3")
            .unwrap()
            .as_group_selection()
            .is_none());
    }

    #[test]
    fn apply_and_guarded_delete() {
        let mut node = ConfigNode::from(json!({"trainer": {"ipus": 4, "max_steps": -1}}));
        Override::parse("trainer.max_steps=500")
            .unwrap()
            .apply(&mut node)
            .unwrap();
        assert_eq!(node.get("trainer.max_steps"), Some(&json!(500)));

        let guarded = Override::parse("~trainer.ipus=8").unwrap();
        assert!(guarded.apply(&mut node).is_err());
        assert!(node.contains("trainer.ipus"));

        Override::parse("~trainer.ipus=4")
            .unwrap()
            .apply(&mut node)
            .unwrap();
        assert!(!node.contains("trainer.ipus"));
    }

    #[test]
    fn display_round_trips_text() {
        for text in ["trainer.max_steps=500", "+a.b=x", "++a=true", "~a.b", "~a=1"] {
            assert_eq!(Override::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn display_quotes_strings_that_would_change_type() {
        let set = |value: Value| Override::Set {
            key: "trainer.precision".into(),
            value,
            mode: SetMode::Existing,
        };
        for value in [json!("bf16"), json!("500"), json!("true"), json!(""), json!(16)] {
            let text = set(value.clone()).to_string();
            assert_eq!(Override::parse(&text).unwrap(), set(value), "{text}");
        }
        assert_eq!(set(json!("bf16")).to_string(), "trainer.precision=bf16");
        assert_eq!(set(json!("500")).to_string(), r#"trainer.precision="500""#);
    }

    #[test]
    fn parse_overrides_stops_at_first_error() {
        let ok = parse_overrides(["a=1", "+b=2"]).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(parse_overrides(vec!["a=1".to_string(), "bad".to_string()]).is_err());
    }
}
