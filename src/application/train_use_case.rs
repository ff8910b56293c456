// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Resolve the dataset cache     (Layer 4 - data)
//           filtered cache → full cache → corpus extraction,
//           whichever stage exists first
//   Step 2: Save config for inference     (Layer 6 - infra)
//   Step 3: Run the training loop         (Layer 5 - ml)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::KvretLoader;
use crate::data::store::DatasetStore;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All knobs for a training run. Serialisable so the checkpoint
// manager can persist it and inference can rebuild the exact model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_file:     String,
    pub valid_file:     String,
    pub test_file:      String,
    pub samples_dir:    String,
    pub checkpoint_dir: String,

    /// Non-reserved vocabulary cap applied by the filter stage.
    /// 0 keeps every word.
    pub vocab_cap: usize,

    /// Truncate long training/validation sequences during corpus
    /// extraction (test samples are never truncated).
    pub truncate: bool,

    /// Longest query (in tokens) the chat surface will encode.
    pub max_length: usize,

    pub batch_size:  usize,
    pub epochs:      usize,
    pub lr:          f64,
    pub hidden_size: usize,
    pub dropout:     f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_file:     "data/kvret_train_public.json".to_string(),
            valid_file:     "data/kvret_dev_public.json".to_string(),
            test_file:      "data/kvret_test_public.json".to_string(),
            samples_dir:    "data/samples".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            vocab_cap:      0,
            truncate:       false,
            max_length:     40,
            batch_size:     126,
            epochs:         100,
            lr:             1e-3,
            hidden_size:    300,
            dropout:        0.1,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: resolve the dataset cache ─────────────────────────────────
        // Cold runs extract the corpus and write both cache stages;
        // warm runs load the filtered cache directly.
        let store = DatasetStore::new(&cfg.samples_dir);
        let mut data = store.load_or_build(
            &KvretLoader::new(&cfg.train_file),
            &KvretLoader::new(&cfg.valid_file),
            &KvretLoader::new(&cfg.test_file),
            cfg.vocab_cap,
            cfg.truncate,
        )?;

        tracing::info!(
            "Loaded kvret: {} words, {} train / {} valid / {} test samples",
            data.vocabulary_size(),
            data.training.len(),
            data.validation.len(),
            data.test.len(),
        );
        if data.training.is_empty() {
            bail!("the training partition is empty — nothing to train on");
        }

        // ── Step 2: save config for inference ─────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 3: run the training loop (Layer 5) ───────────────────────────
        run_training(cfg, &mut data, ckpt_manager, metrics)?;

        Ok(())
    }
}
