// ============================================================
// Layer 2 — Dataset Setup
// ============================================================
// Shared by both use cases: turns prepared JSON files into the
// (train, validation) dataset pair.
//
//   val_path given   → train file + validation file
//   val_path missing → one file, seeded shuffle split
//
// Only the training split is augmented.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::{augment::Augmentation, dataset::FaceDataset, store::PreparedSplit};
use crate::domain::emotion::{Emotion, NUM_EMOTIONS};

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub train_path:   PathBuf,
    pub val_path:     Option<PathBuf>,
    /// Used only when val_path is None
    pub val_fraction: f64,
    pub split_seed:   u64,
    pub augment:      bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path:   PathBuf::from("data/prepared/train.json"),
            val_path:     Some(PathBuf::from("data/prepared/val.json")),
            val_fraction: 0.2,
            split_seed:   42,
            augment:      true,
        }
    }
}

pub fn load_datasets(cfg: &DataConfig) -> Result<(FaceDataset, FaceDataset)> {
    let train = PreparedSplit::load(&cfg.train_path)?;

    let (train, val) = match &cfg.val_path {
        Some(path) => (train, PreparedSplit::load(path)?),
        None => {
            if !(0.0..1.0).contains(&cfg.val_fraction) {
                anyhow::bail!("val_fraction {} not in [0, 1)", cfg.val_fraction);
            }
            train.split(1.0 - cfg.val_fraction, cfg.split_seed)
        }
    };
    tracing::info!("Split: {} train, {} validation", train.len(), val.len());

    let augmentation = cfg.augment.then(Augmentation::face_training);
    let train = train.into_dataset(augmentation).context("Invalid training data")?;
    let val = val.into_dataset(None).context("Invalid validation data")?;
    log_class_counts(train.labels());
    Ok((train, val))
}

fn log_class_counts(labels: &[usize]) {
    let mut counts = [0usize; NUM_EMOTIONS];
    for &label in labels {
        match Emotion::from_label(label) {
            Some(emotion) => counts[emotion.label()] += 1,
            None => tracing::warn!("Label {} is outside the {} emotions", label, NUM_EMOTIONS),
        }
    }
    for (emotion, count) in Emotion::ALL.iter().zip(counts) {
        tracing::debug!("  {:<8} {}", emotion.to_string(), count);
    }
}
