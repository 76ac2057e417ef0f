// ============================================================
// Layer 5 — Epoch Callbacks
// ============================================================
// Three observers of the per-epoch metrics, each owning its
// own Monitor:
//
//   CheckpointCallback — save weights when the metric improves
//   ReduceLrOnPlateau  — decay the learning rate after a plateau
//   EarlyStopping      — signal the trainer to stop
//
// A CallbackSet is built per trial; constructing a new one is
// the only way to reset it.

use anyhow::Result;
use std::path::PathBuf;

use crate::domain::{
    hyperparams::HyperParams,
    metric::{EpochRecord, Metric, MetricMode},
    traits::Checkpointable,
};

// ─── Monitor ──────────────────────────────────────────────────────────────────
/// Tracks the best value of one metric and how long ago it was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    mode:                     MetricMode,
    best:                     Option<f64>,
    epochs_since_improvement: usize,
}

impl Monitor {
    pub fn new(mode: MetricMode) -> Self {
        Self { mode, best: None, epochs_since_improvement: 0 }
    }

    /// Record one epoch's value. Returns true when it is a new best.
    pub fn observe(&mut self, value: f64) -> bool {
        if self.mode.improves_on(value, self.best) {
            self.best = Some(value);
            self.epochs_since_improvement = 0;
            true
        } else {
            self.epochs_since_improvement += 1;
            false
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn epochs_since_improvement(&self) -> usize {
        self.epochs_since_improvement
    }

    fn reset_wait(&mut self) {
        self.epochs_since_improvement = 0;
    }
}

// ─── CheckpointCallback ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CheckpointCallback {
    pub metric: Metric,
    monitor:    Monitor,
    path:       PathBuf,
}

impl CheckpointCallback {
    pub fn new(metric: Metric, mode: MetricMode, path: impl Into<PathBuf>) -> Self {
        Self { metric, monitor: Monitor::new(mode), path: path.into() }
    }

    /// Persist `model` when `value` improves. Returns whether it saved.
    pub fn on_epoch_end<M: Checkpointable + ?Sized>(&mut self, value: f64, model: &M) -> Result<bool> {
        if !self.monitor.observe(value) {
            return Ok(false);
        }
        model.save_weights(&self.path)?;
        tracing::info!("{} improved to {:.4}, saved '{}'", self.metric, value, self.path.display());
        Ok(true)
    }

}

// ─── ReduceLrOnPlateau ────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub metric: Metric,
    monitor:    Monitor,
    factor:     f64,
    patience:   usize,
    min_lr:     f64,
}

impl ReduceLrOnPlateau {
    pub fn new(metric: Metric, mode: MetricMode, factor: f64, patience: usize) -> Self {
        Self { metric, monitor: Monitor::new(mode), factor, patience, min_lr: 0.0 }
    }

    /// Floor below which the learning rate is never reduced.
    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    /// Multiply `lr` by the factor once more than `patience` epochs
    /// have passed without improvement. Returns whether `lr` changed.
    pub fn on_epoch_end(&mut self, value: f64, lr: &mut f64) -> bool {
        self.monitor.observe(value);
        if self.monitor.epochs_since_improvement() <= self.patience {
            return false;
        }
        self.monitor.reset_wait();

        let reduced = (*lr * self.factor).max(self.min_lr);
        if reduced >= *lr {
            return false;
        }
        tracing::info!("{} plateaued, learning rate {:.3e} → {:.3e}", self.metric, *lr, reduced);
        *lr = reduced;
        true
    }
}

// ─── EarlyStopping ────────────────────────────────────────────────────────────
/// Only reports; breaking out of the epoch loop is the trainer's job.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    pub metric: Metric,
    monitor:    Monitor,
    patience:   usize,
}

impl EarlyStopping {
    pub fn new(metric: Metric, mode: MetricMode, patience: usize) -> Self {
        Self { metric, monitor: Monitor::new(mode), patience }
    }

    pub fn on_epoch_end(&mut self, value: f64) -> bool {
        self.monitor.observe(value);
        let stop = self.monitor.epochs_since_improvement() > self.patience;
        if stop {
            tracing::info!(
                "Early stopping: no {} improvement for {} epochs (best {:.4})",
                self.metric,
                self.monitor.epochs_since_improvement(),
                self.monitor.best().unwrap_or(f64::NAN),
            );
        }
        stop
    }
}

// ─── CallbackSet ──────────────────────────────────────────────────────────────
/// What the callbacks did at the end of one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochSignals {
    pub saved:      bool,
    pub lr_reduced: bool,
    pub stop:       bool,
}

#[derive(Debug, Clone)]
pub struct CallbackSet {
    pub checkpoint:     Option<CheckpointCallback>,
    pub plateau:        ReduceLrOnPlateau,
    pub early_stopping: EarlyStopping,
}

impl CallbackSet {
    /// Checkpoint on val_acc, plateau on train_loss, early stop on val_acc.
    pub fn from_hyperparams(hp: &HyperParams, checkpoint_path: Option<PathBuf>) -> Self {
        Self {
            checkpoint: checkpoint_path
                .map(|path| CheckpointCallback::new(Metric::ValAcc, MetricMode::Max, path)),
            plateau: ReduceLrOnPlateau::new(
                Metric::TrainLoss,
                MetricMode::Min,
                hp.reduce_lr_factor,
                hp.reduce_lr_patience,
            )
            .with_min_lr(hp.min_lr),
            early_stopping: EarlyStopping::new(Metric::ValAcc, MetricMode::Max, hp.early_stopping_patience),
        }
    }

    /// Run every callback once, in checkpoint → plateau → early-stop order.
    pub fn on_epoch_end<M: Checkpointable + ?Sized>(
        &mut self,
        record: &EpochRecord,
        model:  &M,
        lr:     &mut f64,
    ) -> Result<EpochSignals> {
        let saved = match self.checkpoint.as_mut() {
            Some(cb) => cb.on_epoch_end(record.value(cb.metric), model)?,
            None     => false,
        };
        let lr_reduced = self.plateau.on_epoch_end(record.value(self.plateau.metric), lr);
        let stop = self.early_stopping.on_epoch_end(record.value(self.early_stopping.metric));
        Ok(EpochSignals { saved, lr_reduced, stop })
    }
}
