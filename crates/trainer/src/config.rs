//! Trainer configuration.
//!
//! Serialised as YAML or JSON. Every field has a default, so `{}` (or an
//! empty YAML file) yields the documented defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use trainconf_common::{load_node, save_node, ConfigNode, Result};
use trainconf_store::ConfigSchema;

use crate::values::{
    AmpBackend, BatchLimit, ComponentSpec, Components, DeviceSelection, GradAccumulation,
    GradientClipAlgorithm, Logger, MaxTime, NormType, Precision, Toggle, TrainloaderMode,
};

/// Runtime settings for the training-loop orchestrator.
///
/// A passive record: values are stored, not checked against each other.
/// Backwards-compatible: missing fields fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    // ── Logging & callbacks ─────────────────────────────────────────────────
    /// Experiment logger(s); `false` disables logging.
    pub logger: Logger,
    pub callbacks: Option<Components>,
    /// Root for logs and checkpoints when no logger/callback sets one.
    pub default_root_dir: Option<PathBuf>,
    pub enable_progress_bar: bool,
    pub log_every_n_steps: u32,
    /// Gradient norm order to log (`-1` = off, `"inf"` = max norm).
    pub track_grad_norm: NormType,
    pub enable_model_summary: bool,
    pub move_metrics_to_cpu: bool,
    pub profiler: Option<ComponentSpec>,

    // ── Hardware ────────────────────────────────────────────────────────────
    pub num_nodes: u32,
    pub gpus: Option<DeviceSelection>,
    pub auto_select_gpus: bool,
    pub tpu_cores: Option<DeviceSelection>,
    pub ipus: Option<u32>,
    /// Accelerator kind (`cpu`, `gpu`, `tpu`, `auto`, ...).
    pub accelerator: Option<String>,
    pub devices: Option<DeviceSelection>,
    pub strategy: Option<ComponentSpec>,
    pub sync_batchnorm: bool,
    pub plugins: Option<Components>,

    // ── Precision ───────────────────────────────────────────────────────────
    /// `16`, `32`, `64`, or a named mode such as `bf16`.
    pub precision: Precision,
    pub amp_backend: AmpBackend,
    /// Optimisation level, only read by the `apex` backend.
    pub amp_level: Option<String>,

    // ── Loop length ─────────────────────────────────────────────────────────
    pub max_epochs: i64,
    pub min_epochs: i64,
    /// `-1` means no step limit.
    pub max_steps: Option<i64>,
    pub min_steps: Option<i64>,
    pub max_time: Option<MaxTime>,
    /// Run a single batch of each loop as a smoke test.
    pub fast_dev_run: bool,

    // ── Batches ─────────────────────────────────────────────────────────────
    pub overfit_batches: BatchLimit,
    pub limit_train_batches: BatchLimit,
    pub limit_val_batches: BatchLimit,
    pub limit_test_batches: BatchLimit,
    pub limit_predict_batches: f64,
    pub accumulate_grad_batches: GradAccumulation,
    pub multiple_trainloader_mode: TrainloaderMode,
    pub replace_sampler_ddp: bool,
    pub reload_dataloaders_every_n_epochs: u32,

    // ── Validation ──────────────────────────────────────────────────────────
    pub check_val_every_n_epoch: u32,
    /// Fraction of an epoch (float) or number of batches (int) between checks.
    pub val_check_interval: BatchLimit,
    /// Sanity validation batches before training; `-1` runs them all.
    pub num_sanity_val_steps: i64,

    // ── Optimisation ────────────────────────────────────────────────────────
    /// `0` disables clipping.
    pub gradient_clip_val: f64,
    pub gradient_clip_algorithm: GradientClipAlgorithm,
    pub auto_lr_find: Toggle,
    /// `power` or `binsearch` when enabled by name.
    pub auto_scale_batch_size: Toggle,

    // ── Reproducibility & debugging ─────────────────────────────────────────
    pub deterministic: bool,
    pub benchmark: bool,
    pub detect_anomaly: bool,

    // ── Checkpointing ───────────────────────────────────────────────────────
    pub enable_checkpointing: bool,
    pub weights_save_path: Option<PathBuf>,
    pub resume_from_checkpoint: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            logger: Logger::Enabled(true),
            callbacks: None,
            default_root_dir: None,
            enable_progress_bar: true,
            log_every_n_steps: 50,
            track_grad_norm: NormType::Order(-1),
            enable_model_summary: true,
            move_metrics_to_cpu: false,
            profiler: None,

            num_nodes: 1,
            gpus: None,
            auto_select_gpus: false,
            tpu_cores: None,
            ipus: None,
            accelerator: None,
            devices: None,
            strategy: None,
            sync_batchnorm: false,
            plugins: None,

            precision: Precision::Bits(32),
            amp_backend: AmpBackend::Native,
            amp_level: None,

            max_epochs: 1000,
            min_epochs: 1,
            max_steps: Some(-1),
            min_steps: None,
            max_time: None,
            fast_dev_run: false,

            overfit_batches: BatchLimit::Fraction(0.0),
            limit_train_batches: BatchLimit::Fraction(1.0),
            limit_val_batches: BatchLimit::Fraction(1.0),
            limit_test_batches: BatchLimit::Fraction(1.0),
            limit_predict_batches: 1.0,
            accumulate_grad_batches: GradAccumulation::Constant(1),
            multiple_trainloader_mode: TrainloaderMode::MaxSizeCycle,
            replace_sampler_ddp: true,
            reload_dataloaders_every_n_epochs: 0,

            check_val_every_n_epoch: 1,
            val_check_interval: BatchLimit::Fraction(1.0),
            num_sanity_val_steps: 2,

            gradient_clip_val: 0.0,
            gradient_clip_algorithm: GradientClipAlgorithm::Norm,
            auto_lr_find: Toggle::Flag(false),
            auto_scale_batch_size: Toggle::Flag(false),

            deterministic: false,
            benchmark: false,
            detect_anomaly: false,

            enable_checkpointing: false,
            weights_save_path: None,
            resume_from_checkpoint: None,
        }
    }
}

impl ConfigSchema for TrainerConfig {
    const GROUP: &'static str = "trainer";
    const NAME: &'static str = "trainer";
}

impl TrainerConfig {
    /// Load from a YAML or JSON file holding the trainer fields at the top level.
    /// The file is merged strictly over the defaults, so a misspelled key is an
    /// error rather than a silently ignored line.
    pub fn load(path: &Path) -> Result<Self> {
        let mut node = Self::default().to_node()?;
        node.merge(load_node(path)?.as_value(), true)?;
        node.to()
    }

    /// Save to a YAML or JSON file (format follows the extension).
    pub fn save(&self, path: &Path) -> Result<()> {
        save_node(&self.to_node()?, path)
    }

    pub fn to_node(&self) -> Result<ConfigNode> {
        ConfigNode::from_serialize(self)
    }

    /// Dotted names of the fields that differ from the defaults.
    pub fn changed_fields(&self) -> Result<Vec<String>> {
        Ok(Self::default().to_node()?.diff(&self.to_node()?))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
