//! trainconf: typed trainer configuration with a `(group, name)` registry.
//!
//! Builds the registry by explicit registration and composes configs from
//! registered defaults, YAML/JSON files, command-line overrides and code.
//!
//! ```no_run
//! use trainconf::{default_store, Composer, TrainerConfig};
//!
//! let store = default_store()?;
//! let trainer: TrainerConfig = Composer::new(&store)
//!     .select("trainer", "trainer")
//!     .with_overrides(["trainer.max_steps=500"])?
//!     .instantiate()?;
//! assert_eq!(trainer.max_steps, Some(500));
//! # Ok::<(), trainconf::ConfError>(())
//! ```

use std::sync::OnceLock;

pub use trainconf_common::{
    load_node, parse_overrides, save_node, ConfError, ConfigFormat, ConfigNode, Override,
    Result, SetMode,
};
pub use trainconf_store::{package_of, Composer, ConfigEntry, ConfigSchema, ConfigStore};
pub use trainconf_trainer::{self as trainer, TrainerConfig};

/// Build a store holding every schema of the workspace.
pub fn default_store() -> Result<ConfigStore> {
    let mut store = ConfigStore::new();
    register_all(&mut store)?;
    Ok(store)
}

/// Add every schema of the workspace to `store`.
pub fn register_all(store: &mut ConfigStore) -> Result<()> {
    trainconf_trainer::register(store)?;
    tracing::debug!(entries = store.len(), "Default registrations complete");
    Ok(())
}

static GLOBAL: OnceLock<Result<ConfigStore>> = OnceLock::new();

/// Process-wide store, built by [`default_store`] on first use. Later calls
/// return the same instance; registration runs once per process.
pub fn global_store() -> std::result::Result<&'static ConfigStore, &'static ConfError> {
    GLOBAL.get_or_init(default_store).as_ref()
}
