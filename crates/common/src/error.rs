//! Error type shared by every crate in the workspace.
//!
//! Each variant names the offending path or key so a failed composition can
//! be fixed without reading the source.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfError>;

/// Errors raised while registering, composing, or instantiating configs.
#[derive(Error, Debug)]
pub enum ConfError {
    /// No entry stored under `group/name`.
    #[error("no config registered as '{group}/{name}'\n  → run `trainconf list` to see available entries")]
    NotFound { group: String, name: String },

    /// Key is not part of the schema (strict mode).
    #[error("key '{path}' is not in the config schema\n  → use '+{path}=...' to add a new key")]
    UnknownKey { path: String },

    /// `+key=value` on a key that already exists.
    #[error("key '{path}' already exists\n  → drop the '+' prefix to override it, or use '++'")]
    KeyExists { path: String },

    /// Deletion or lookup of a key that is not there.
    #[error("key '{path}' not found")]
    MissingKey { path: String },

    /// A dotted path walks through a value that is not a mapping.
    #[error("'{path}' is not a mapping, cannot address a child key")]
    NotAMapping { path: String },

    /// Override string could not be parsed.
    #[error("invalid override '{text}': {message}")]
    Override { text: String, message: String },

    /// File extension is not a known config format.
    #[error("unsupported config format: {path}\n  → use a .yaml, .yml or .json file")]
    UnsupportedFormat { path: PathBuf },

    /// File content failed to parse.
    #[error("cannot parse {path}:\n  {message}")]
    Parse { path: PathBuf, message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Composed node does not fit the typed record.
    #[error("cannot instantiate '{path}': {message}")]
    Instantiate { path: String, message: String },

    /// A schema value could not be turned into a node.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// A stored value cannot be interpreted.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an override parse error.
    pub fn bad_override(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Override {
            text: text.into(),
            message: message.into(),
        }
    }

    /// True when the error was caused by user input rather than IO.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::Serialization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_suggests_plus_prefix() {
        let err = ConfError::UnknownKey {
            path: "trainer.foo".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("trainer.foo"));
        assert!(msg.contains("'+trainer.foo=...'"));
    }

    #[test]
    fn io_errors_are_not_user_errors() {
        let err = ConfError::io(
            "read conf.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_user_error());
        assert!(err.to_string().contains("read conf.yaml"));
        assert!(ConfError::bad_override("x", "no '='").is_user_error());
    }
}
