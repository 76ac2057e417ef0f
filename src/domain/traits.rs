// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams between the orchestration code and the model:
//
//   TrialRunner   — "train with this configuration, give me a
//                   score". The tuner only ever sees this trait;
//                   FaceTrainer implements it, tests use closures.
//
//   Checkpointable — "write your weights here". The checkpoint
//                   callback only ever sees this trait;
//                   FusionHead implements it via burn records.

use anyhow::Result;
use std::path::Path;

use crate::domain::hyperparams::HyperParams;

// ─── TrialRunner ──────────────────────────────────────────────────────────────
/// The training entrypoint called once per tuning trial.
pub trait TrialRunner {
    /// Train trial number `trial` with `hp` and return its best
    /// monitored value.
    fn run_trial(&mut self, trial: usize, hp: &HyperParams) -> Result<f64>;
}

impl<F> TrialRunner for F
where
    F: FnMut(usize, &HyperParams) -> Result<f64>,
{
    fn run_trial(&mut self, trial: usize, hp: &HyperParams) -> Result<f64> {
        self(trial, hp)
    }
}

// ─── Checkpointable ───────────────────────────────────────────────────────────
/// Anything whose current weights can be persisted to a path.
pub trait Checkpointable {
    fn save_weights(&self, path: &Path) -> Result<()>;
}
