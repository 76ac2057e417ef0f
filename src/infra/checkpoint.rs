// ============================================================
// Layer 6 — Checkpoints and Configuration Files
// ============================================================
// Saves and restores FusionHead weights with Burn's
// CompactRecorder, and reads/writes the best-configuration
// JSON produced by the hyperparameter search.
//
// File layout under the output directory:
//   output/
//     best_model.mpk         ← weights from the best val_acc epoch
//                              of the most recent run
//     metrics.csv            ← per-epoch metrics (see metrics.rs)
//     best_hp.json           ← best HyperParams found so far
//
// Every run checkpoints to the same best_model file, so after a
// search it holds the last trial's best epoch, not the best
// trial's. Retrain with `train` to get weights for best_hp.json.
//
// CompactRecorder appends its own extension, so model paths are
// passed around without one (see `record_file`).
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};

use crate::domain::{
    error::{FaceError, FaceResult},
    hyperparams::HyperParams,
    traits::Checkpointable,
};
use crate::ml::fusion::FusionHead;

pub const MODEL_STEM: &str = "best_model";

/// `stem` plus the extension CompactRecorder writes for backend `B`.
pub fn record_file<B: Backend>(stem: &Path) -> PathBuf {
    stem.with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
}

/// Owns the output directory for one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the checkpoint callback (no extension).
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_STEM)
    }
}

impl<B: Backend> Checkpointable for FusionHead<B> {
    fn save_weights(&self, path: &Path) -> Result<()> {
        CompactRecorder::new()
            .record(self.clone().into_record(), path.to_path_buf())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved checkpoint '{}'", record_file::<B>(path).display());
        Ok(())
    }
}

// ─── Best-configuration file ──────────────────────────────────────────────────
/// Pretty JSON, overwritten in place.
pub fn save_hyperparams(path: &Path, hp: &HyperParams) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let json = serde_json::to_string_pretty(hp)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write hyperparameters to '{}'", path.display()))?;
    tracing::debug!("Saved hyperparameters to '{}'", path.display());
    Ok(())
}

/// Missing keys take their defaults; unknown keys are rejected.
pub fn load_hyperparams(path: &Path) -> FaceResult<HyperParams> {
    if !path.exists() {
        return Err(FaceError::NotFound(path.to_path_buf()));
    }
    let json = fs::read_to_string(path)
        .map_err(|e| FaceError::InvalidConfig(format!("cannot read '{}': {e}", path.display())))?;
    let hp: HyperParams = serde_json::from_str(&json)
        .map_err(|e| FaceError::InvalidConfig(format!("malformed '{}': {e}", path.display())))?;
    hp.validate()?;
    Ok(hp)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::ImageShape;
    use crate::ml::{backbone::select_backbone, fusion::FusionHeadConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_hyperparams_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/best_hp.json");
        let hp = HyperParams { conv_model_name: "mobilenet".into(), dense_units: 64, ..HyperParams::default() };
        save_hyperparams(&path, &hp).unwrap();
        assert_eq!(load_hyperparams(&path).unwrap(), hp);
    }

    #[test]
    fn test_missing_hyperparams_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_hyperparams(&dir.path().join("best_hp.json")).unwrap_err();
        assert!(matches!(err, FaceError::NotFound(_)));
    }

    #[test]
    fn test_unknown_key_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_hp.json");
        fs::write(&path, r#"{"dense_units": 8, "l1_l2_reg": 0.01}"#).unwrap();
        assert!(matches!(load_hyperparams(&path), Err(FaceError::InvalidConfig(_))));
    }

    #[test]
    fn test_save_weights_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("out")).unwrap();
        let device = Default::default();
        let build = || {
            let backbone = select_backbone::<TestBackend>("resnet18", ImageShape::new(3, 32, 32), None, &device).unwrap();
            FusionHeadConfig::new(7, [3, 32, 32], 2)
                .with_dense_units(8)
                .init(backbone, &device)
                .unwrap()
        };

        let file = record_file::<TestBackend>(&manager.model_path());
        assert!(!file.exists());

        build().save_weights(&manager.model_path()).unwrap();
        assert!(file.exists());
        assert_eq!(file.file_name().unwrap(), "best_model.mpk");

        let loaded = build()
            .load_file(manager.model_path(), &CompactRecorder::new(), &device)
            .unwrap();
        assert_eq!(loaded.base_output_size, 512);
    }
}
