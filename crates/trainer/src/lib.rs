//! # trainconf-trainer — Trainer Settings
//!
//! * **[`TrainerConfig`]** — every recognised trainer option with its default.
//! * **[`values`]** — typed shapes for options that accept several kinds of
//!   value (precision, devices, batch limits, max time, ...).
//! * **[`register`]** — stores the schema as `trainer/trainer`.

pub mod config;
pub mod values;

pub use config::TrainerConfig;
pub use values::{
    AmpBackend, BatchLimit, ComponentSpec, Components, DeviceSelection, GradAccumulation,
    GradientClipAlgorithm, Logger, MaxTime, NormType, Precision, TimeFields, Toggle,
    TrainloaderMode,
};

use trainconf_common::Result;
use trainconf_store::{ConfigSchema, ConfigStore};

/// Register [`TrainerConfig`] under group `trainer`, name `trainer`.
pub fn register(store: &mut ConfigStore) -> Result<()> {
    store.store_schema::<TrainerConfig>()?;
    Ok(())
}
