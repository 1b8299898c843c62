//! # trainconf-store — Registry & Composition
//!
//! * **[`ConfigStore`]** — `(group, name)` → config node registry, filled by
//!   explicit registration calls.
//! * **[`ConfigSchema`]** — a typed record whose defaults form its schema.
//! * **[`Composer`]** — selections + files + overrides + code values → one
//!   composed tree, then typed instantiation.

pub mod compose;
pub mod registry;

pub use compose::Composer;
pub use registry::{package_of, ConfigEntry, ConfigSchema, ConfigStore};
