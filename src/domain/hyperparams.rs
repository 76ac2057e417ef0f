// ============================================================
// Layer 3 — Hyperparameter Record
// ============================================================
// One trial's full configuration: model architecture choices
// plus training hyperparameters. Produced either by merging a
// sampled assignment onto the defaults, or by loading the
// best-configuration JSON written by a previous search.
//
// Immutable once a trial starts; the trainer only borrows it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{FaceError, FaceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HyperParams {
    // ── Architecture ─────────────────────────────────────────
    /// Backbone name, e.g. "resnet18" (see BackboneKind)
    pub conv_model_name:   String,
    pub dense_units:       usize,
    /// Total dense layers in the fusion stack (first layer included)
    pub num_layers:        usize,
    pub dropout_rate:      f64,
    pub layers_batch_norm: bool,
    pub use_landmarks:     bool,

    // ── Training ─────────────────────────────────────────────
    pub learning_rate:           f64,
    pub reduce_lr_factor:        f64,
    pub reduce_lr_patience:      usize,
    /// Floor for plateau decay
    pub min_lr:                  f64,
    pub early_stopping_patience: usize,
    pub epochs:                  usize,
    pub batch_size:              usize,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            conv_model_name:         "resnet18".to_string(),
            dense_units:             512,
            num_layers:              2,
            dropout_rate:            0.2,
            layers_batch_norm:       true,
            use_landmarks:           true,
            learning_rate:           1e-4,
            reduce_lr_factor:        0.5,
            reduce_lr_patience:      3,
            min_lr:                  0.0,
            early_stopping_patience: 8,
            epochs:                  50,
            batch_size:              32,
        }
    }
}

impl HyperParams {
    /// Overlay `overrides` (name → JSON value) on top of the defaults.
    ///
    /// Unknown names and ill-typed values are rejected, so a search
    /// space cannot silently tune a parameter the model never reads.
    pub fn with_overrides(overrides: &Map<String, Value>) -> FaceResult<Self> {
        let mut base = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Err(FaceError::InvalidConfig("default hyperparameters are not an object".into())),
        };
        for (name, value) in overrides {
            base.insert(name.clone(), value.clone());
        }
        let hp: Self = serde_json::from_value(Value::Object(base))
            .map_err(|e| FaceError::InvalidConfig(e.to_string()))?;
        hp.validate()?;
        Ok(hp)
    }

    /// Range checks that serde's typing cannot express.
    pub fn validate(&self) -> FaceResult<()> {
        let fail = |msg: String| Err(FaceError::InvalidConfig(msg));

        if self.num_layers == 0 {
            return fail("num_layers must be at least 1".into());
        }
        if self.dense_units == 0 {
            return fail("dense_units must be at least 1".into());
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return fail(format!("dropout_rate {} not in [0, 1)", self.dropout_rate));
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!("learning_rate {} must be positive", self.learning_rate));
        }
        if !(self.reduce_lr_factor > 0.0 && self.reduce_lr_factor <= 1.0) {
            return fail(format!("reduce_lr_factor {} not in (0, 1]", self.reduce_lr_factor));
        }
        if !(self.min_lr >= 0.0 && self.min_lr <= self.learning_rate) {
            return fail(format!("min_lr {} not in [0, learning_rate]", self.min_lr));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return fail("epochs and batch_size must be at least 1".into());
        }
        Ok(())
    }
}
