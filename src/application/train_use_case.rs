// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Trains once with the best configuration a search found:
//
//   Step 1: Load best_hp.json          (Layer 6 - infra)
//   Step 2: Load prepared data         (Layer 4 - data)
//   Step 3: Build the trainer          (Layer 5 - ml)
//   Step 4: Train, checkpoint, log     (Layer 5 - ml)
//
// RunOptions holds what both use cases share: where outputs
// go and how the trainer is set up apart from HyperParams.

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::datasets::{load_datasets, DataConfig};
use crate::domain::{emotion::NUM_EMOTIONS, metric::{Metric, TrialResult}};
use crate::infra::checkpoint::{load_hyperparams, CheckpointManager};
use crate::ml::{fusion::ClassWeights, trainer::{FaceTrainer, TrainSettings}};

// ─── Shared run options ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir:       PathBuf,
    /// Pretrained backbone records; None = random init
    pub weights_dir:      Option<PathBuf>,
    pub metric:           Metric,
    /// Weight classes by inverse frequency in the training split
    pub balanced_weights: bool,
    pub num_workers:      usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir:       PathBuf::from("output"),
            weights_dir:      None,
            metric:           Metric::ValAcc,
            balanced_weights: false,
            num_workers:      1,
        }
    }
}

impl RunOptions {
    pub fn train_settings(&self, train_labels: &[usize]) -> Result<TrainSettings> {
        let ckpt = CheckpointManager::new(&self.output_dir)?;
        let class_weights = self
            .balanced_weights
            .then(|| ClassWeights::balanced(train_labels, NUM_EMOTIONS).as_slice().to_vec());

        Ok(TrainSettings {
            metric: self.metric,
            mode: self.metric.natural_mode(),
            weights_dir: self.weights_dir.clone(),
            checkpoint_path: Some(ckpt.model_path()),
            metrics_dir: Some(ckpt.dir().to_path_buf()),
            class_weights,
            num_workers: self.num_workers,
            ..TrainSettings::default()
        })
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainRunConfig {
    pub data:         DataConfig,
    pub run:          RunOptions,
    pub best_hp_path: PathBuf,
}

impl Default for TrainRunConfig {
    fn default() -> Self {
        Self {
            data:         DataConfig::default(),
            run:          RunOptions::default(),
            best_hp_path: PathBuf::from("output/best_hp.json"),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainRunConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainRunConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrialResult> {
        train_using_best_values::<B>(&self.config, device)
    }
}

/// Load the best configuration file and train with it.
pub fn train_using_best_values<B: AutodiffBackend>(cfg: &TrainRunConfig, device: B::Device) -> Result<TrialResult> {
    // ── Step 1: Best configuration ────────────────────────────────────────────
    let hp = load_hyperparams(&cfg.best_hp_path)
        .with_context(|| "No best configuration yet. Run 'tune' first?")?;
    tracing::info!("Training with best configuration from '{}'", cfg.best_hp_path.display());
    tracing::debug!("{:?}", hp);

    // ── Step 2: Data ──────────────────────────────────────────────────────────
    let (train, val) = load_datasets(&cfg.data)?;

    // ── Step 3 + 4: Train ─────────────────────────────────────────────────────
    let settings = cfg.run.train_settings(train.labels())?;
    let mut trainer = FaceTrainer::<B>::new(settings, train, val, device)?;
    trainer.train("best", &hp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FaceError;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_missing_best_configuration_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainRunConfig {
            best_hp_path: dir.path().join("best_hp.json"),
            ..TrainRunConfig::default()
        };
        let err = train_using_best_values::<Autodiff<NdArray>>(&cfg, Default::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<FaceError>(), Some(FaceError::NotFound(_))));
    }

    #[test]
    fn test_train_settings_point_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunOptions { output_dir: dir.path().join("out"), balanced_weights: true, ..RunOptions::default() };
        let settings = run.train_settings(&[0, 0, 1]).unwrap();
        assert_eq!(settings.checkpoint_path, Some(dir.path().join("out/best_model")));
        assert_eq!(settings.class_weights.map(|w| w.len()), Some(NUM_EMOTIONS));
    }
}
