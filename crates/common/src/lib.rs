//! # trainconf-common — Shared Primitives
//!
//! Types shared by every crate in the workspace:
//!
//! * **[`ConfigNode`]** — dotted-path config tree, strict merge, typed instantiation.
//! * **[`Override`]** — `key=value` / `+key=value` / `~key` command-line grammar.
//! * **[`ConfigFormat`]** — YAML / JSON files, picked by extension.
//! * **[`ConfError`]** — the one error type, with actionable messages.

pub mod error;
pub mod format;
pub mod node;
pub mod overrides;

pub use error::{ConfError, Result};
pub use format::{load_node, save_node, yaml_to_value, ConfigFormat};
pub use node::{ConfigNode, SetMode};
pub use overrides::{parse_overrides, Override};
