// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One call to FaceTrainer::train is one trial:
//
//   HyperParams ──► backbone + FusionHead ──► Adam
//        │
//        ▼
//   for epoch in 1..=epochs
//       train phase   (augmented loader, autodiff backend)
//       valid phase   (plain loader, model.valid())
//       EpochRecord   → tracing + metrics.csv
//       CallbackSet   → checkpoint / LR decay / stop signal
//       stop signal?  → break (after the callbacks ran)
//
// The trial's score is the best value of the target metric
// across the epochs that ran.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{path::PathBuf, sync::Arc};

use crate::data::{batcher::FaceBatcher, dataset::FaceDataset};
use crate::domain::{
    emotion::NUM_EMOTIONS,
    error::FaceError,
    hyperparams::HyperParams,
    metric::{EpochRecord, Metric, MetricMode, TrialResult},
    traits::TrialRunner,
};
use crate::infra::metrics::MetricsLogger;
use crate::ml::{
    backbone::select_backbone,
    callbacks::CallbackSet,
    fusion::{ClassWeights, FusionHead, FusionHeadConfig},
};

// ─── Settings ─────────────────────────────────────────────────────────────────
/// Everything about a training run that is not a hyperparameter.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub num_classes:     usize,
    /// Target metric returned to the tuner
    pub metric:          Metric,
    pub mode:            MetricMode,
    /// Directory of pretrained backbone records; None = random init
    pub weights_dir:     Option<PathBuf>,
    /// Where the checkpoint callback writes (no extension); None disables it
    pub checkpoint_path: Option<PathBuf>,
    /// Directory for metrics.csv; None disables CSV logging
    pub metrics_dir:     Option<PathBuf>,
    /// Start metrics.csv over instead of appending
    pub reset_metrics:   bool,
    /// None = uniform
    pub class_weights:   Option<Vec<f32>>,
    pub num_workers:     usize,
    pub shuffle_seed:    u64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            num_classes:     NUM_EMOTIONS,
            metric:          Metric::ValAcc,
            mode:            MetricMode::Max,
            weights_dir:     None,
            checkpoint_path: None,
            metrics_dir:     None,
            reset_metrics:   false,
            class_weights:   None,
            num_workers:     1,
            shuffle_seed:    42,
        }
    }
}

// ─── FaceTrainer ──────────────────────────────────────────────────────────────
pub struct FaceTrainer<B: AutodiffBackend> {
    settings: TrainSettings,
    weights:  ClassWeights,
    train:    Arc<FaceDataset>,
    valid:    Arc<FaceDataset>,
    device:   B::Device,
    metrics:  Option<MetricsLogger>,
}

impl<B: AutodiffBackend> FaceTrainer<B> {
    pub fn new(settings: TrainSettings, train: FaceDataset, valid: FaceDataset, device: B::Device) -> Result<Self> {
        if train.is_empty() {
            return Err(FaceError::InvalidConfig("training split is empty".into()).into());
        }
        if train.shape() != valid.shape() {
            return Err(FaceError::InvalidConfig(format!(
                "train images are {:?} but validation images are {:?}",
                train.shape(),
                valid.shape()
            ))
            .into());
        }
        if !valid.is_empty() && train.landmark_len() != valid.landmark_len() {
            return Err(FaceError::LengthMismatch {
                what:     "validation landmark vector",
                expected: train.landmark_len(),
                found:    valid.landmark_len(),
            }
            .into());
        }
        let max_label = train.labels().iter().chain(valid.labels()).copied().max().unwrap_or(0);
        if max_label >= settings.num_classes {
            return Err(FaceError::InvalidConfig(format!(
                "label {max_label} out of range for {} classes",
                settings.num_classes
            ))
            .into());
        }

        let weights = match &settings.class_weights {
            Some(w) => ClassWeights::new(w.clone(), settings.num_classes)?,
            None    => ClassWeights::uniform(settings.num_classes),
        };
        let metrics = settings
            .metrics_dir
            .as_ref()
            .map(|dir| MetricsLogger::new(dir, settings.reset_metrics))
            .transpose()?;
        if let Some(logger) = &metrics {
            tracing::debug!("Epoch metrics go to '{}'", logger.csv_path().display());
        }

        tracing::info!(
            "Trainer ready: {} train / {} validation samples, image {:?}, {} landmark values, augmentation {}",
            train.len(),
            valid.len(),
            train.shape().as_array(),
            train.landmark_len(),
            if train.is_augmented() { "on" } else { "off" },
        );

        Ok(Self {
            settings,
            weights,
            train: Arc::new(train),
            valid: Arc::new(valid),
            device,
            metrics,
        })
    }

    /// Backbone + fusion head for `hp`, on the autodiff backend.
    pub fn build_model(&self, hp: &HyperParams) -> Result<FusionHead<B>> {
        let shape = self.train.shape();
        let backbone = select_backbone::<B>(
            &hp.conv_model_name,
            shape,
            self.settings.weights_dir.as_deref(),
            &self.device,
        )?;
        let model = FusionHeadConfig::from_hyperparams(hp, self.settings.num_classes, shape, self.train.landmark_len())
            .init(backbone, &self.device)?;
        Ok(model)
    }

    /// Run one full training and return every epoch's record.
    /// `run` labels this run's rows in metrics.csv.
    pub fn train(&mut self, run: &str, hp: &HyperParams) -> Result<TrialResult> {
        hp.validate()?;

        let mut model = self.build_model(hp)
            .with_context(|| format!("Cannot build model '{}'", hp.conv_model_name))?;
        tracing::info!(
            "Run {}: {} backbone, {} dense layers × {} units, landmarks {}",
            run,
            hp.conv_model_name,
            hp.num_layers,
            hp.dense_units,
            if hp.use_landmarks { "on" } else { "off" },
        );

        // ── Adam optimiser ────────────────────────────────────────────────────
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let mut lr = hp.learning_rate;

        // ── Data loaders ──────────────────────────────────────────────────────
        let shape = self.train.shape();
        let train_loader = DataLoaderBuilder::new(FaceBatcher::<B>::new(self.device.clone(), shape))
            .batch_size(hp.batch_size)
            .shuffle(self.settings.shuffle_seed)
            .num_workers(self.settings.num_workers)
            .build(self.train.clone());

        // Validation on the inner backend: no autodiff overhead
        let valid_loader = DataLoaderBuilder::new(FaceBatcher::<B::InnerBackend>::new(self.device.clone(), shape))
            .batch_size(hp.batch_size)
            .num_workers(self.settings.num_workers)
            .build(self.valid.clone());

        let mut callbacks = CallbackSet::from_hyperparams(hp, self.settings.checkpoint_path.clone());
        let mut result = TrialResult::new(self.settings.metric, self.settings.mode);

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=hp.epochs {
            let epoch_lr = lr;

            // ── Training phase ────────────────────────────────────────────────
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;
            let mut train_correct  = 0usize;
            let mut train_total    = 0usize;

            for batch in train_loader.iter() {
                let step = model.forward_classification(batch, &self.weights);
                train_loss_sum += step.loss.clone().into_scalar().elem::<f64>();
                train_batches  += 1;
                train_correct  += step.correct;
                train_total    += step.total;

                let grads = step.loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
            }

            // ── Validation phase ──────────────────────────────────────────────
            let model_valid = model.valid();
            let mut val_loss_sum = 0.0f64;
            let mut val_batches  = 0usize;
            let mut val_correct  = 0usize;
            let mut val_total    = 0usize;

            for batch in valid_loader.iter() {
                let step = model_valid.forward_classification(batch, &self.weights);
                val_loss_sum += step.loss.into_scalar().elem::<f64>();
                val_batches  += 1;
                val_correct  += step.correct;
                val_total    += step.total;
            }

            let record = EpochRecord {
                epoch,
                train_loss: mean(train_loss_sum, train_batches),
                train_acc:  ratio(train_correct, train_total),
                val_loss:   mean(val_loss_sum, val_batches),
                val_acc:    ratio(val_correct, val_total),
                lr:         epoch_lr,
            };

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | val_loss={:.4} | val_acc={:.1}% | lr={:.2e}",
                epoch, hp.epochs,
                record.train_loss, record.train_acc * 100.0,
                record.val_loss, record.val_acc * 100.0,
                epoch_lr,
            );
            if let Some(logger) = &self.metrics {
                logger.log(run, &record)?;
            }
            result.push(record);

            let signals = callbacks.on_epoch_end(&record, &model, &mut lr)?;
            if signals.stop {
                tracing::info!("Stopping run {} after epoch {}", run, epoch);
                break;
            }
        }

        tracing::info!(
            "Run {} complete: best {} = {:.4}",
            run,
            result.metric,
            result.best_value().unwrap_or(f64::NAN),
        );
        Ok(result)
    }
}

impl<B: AutodiffBackend> TrialRunner for FaceTrainer<B> {
    fn run_trial(&mut self, trial: usize, hp: &HyperParams) -> Result<f64> {
        let result = self.train(&format!("trial_{trial}"), hp)?;
        Ok(result.best_value().unwrap_or_else(|| {
            tracing::warn!("No epoch produced a finite {}", result.metric);
            f64::NAN
        }))
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total > 0 { hits as f64 / total as f64 } else { 0.0 }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::ImageShape;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    const SIDE: usize = 32;

    fn dataset(n: usize, channels: usize) -> FaceDataset {
        let shape = ImageShape::new(channels, SIDE, SIDE);
        FaceDataset::new(
            (0..n).map(|i| vec![(i % 5) as f32 / 5.0; shape.numel()]).collect(),
            (0..n).map(|i| vec![i as f32 / n as f32; 4]).collect(),
            (0..n).map(|i| i % 2).collect(),
            shape,
            None,
        )
        .unwrap()
    }

    fn small_hp(epochs: usize) -> HyperParams {
        HyperParams {
            conv_model_name: "resnet18".into(),
            dense_units: 8,
            num_layers: 2,
            epochs,
            batch_size: 4,
            early_stopping_patience: 100,
            ..HyperParams::default()
        }
    }

    fn trainer(settings: TrainSettings) -> FaceTrainer<TestBackend> {
        FaceTrainer::new(settings, dataset(8, 3), dataset(4, 3), Default::default()).unwrap()
    }

    #[test]
    fn test_trains_and_logs_every_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TrainSettings {
            metrics_dir: Some(dir.path().to_path_buf()),
            checkpoint_path: Some(dir.path().join("best_model")),
            ..TrainSettings::default()
        };
        let mut trainer = trainer(settings);
        let result = trainer.train("best", &small_hp(2)).unwrap();

        assert_eq!(result.epochs.len(), 2);
        let best = result.best_value().unwrap();
        assert!((0.0..=1.0).contains(&best));
        assert!(dir.path().join("best_model.mpk").exists());

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().skip(1).all(|l| l.starts_with("best,")));
    }

    #[test]
    fn test_early_stop_breaks_after_triggering_epoch() {
        // no validation samples: val_acc is 0.0 every epoch, so only
        // epoch 1 ever improves it
        let stalled = |patience: usize| {
            let mut trainer =
                FaceTrainer::<TestBackend>::new(TrainSettings::default(), dataset(8, 3), dataset(0, 3), Default::default())
                    .unwrap();
            let hp = HyperParams { early_stopping_patience: patience, learning_rate: 1e-12, ..small_hp(6) };
            trainer.train("trial_0", &hp).unwrap()
        };

        let result = stalled(0);
        assert_eq!(result.epochs.len(), 2);
        assert!(result.epochs.iter().all(|e| e.val_acc == 0.0));

        assert_eq!(stalled(2).epochs.len(), 4);
    }

    #[test]
    fn test_trial_rows_carry_the_trial_index() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TrainSettings { metrics_dir: Some(dir.path().to_path_buf()), ..TrainSettings::default() };
        let mut trainer = trainer(settings);
        trainer.run_trial(3, &small_hp(1)).unwrap();
        trainer.run_trial(4, &small_hp(1)).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        let runs: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(runs, vec!["trial_3", "trial_4"]);
    }

    #[test]
    fn test_unknown_backbone_fails_trial() {
        let mut trainer = trainer(TrainSettings::default());
        let hp = HyperParams { conv_model_name: "lenet".into(), ..small_hp(1) };
        let err = trainer.run_trial(0, &hp).unwrap_err();
        assert!(matches!(err.downcast_ref::<FaceError>(), Some(FaceError::UnknownBackbone(_))));
    }

    #[test]
    fn test_grayscale_images_are_rejected_for_backbones() {
        let mut trainer = FaceTrainer::<TestBackend>::new(
            TrainSettings::default(),
            dataset(4, 1),
            dataset(2, 1),
            Default::default(),
        )
        .unwrap();
        assert!(trainer.run_trial(0, &small_hp(1)).is_err());
    }

    #[test]
    fn test_label_out_of_range_is_rejected() {
        let settings = TrainSettings { num_classes: 1, ..TrainSettings::default() };
        let err = FaceTrainer::<TestBackend>::new(settings, dataset(4, 3), dataset(2, 3), Default::default());
        assert!(err.is_err());
    }
}
