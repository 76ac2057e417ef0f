// ============================================================
// Layer 2 — TuneUseCase
// ============================================================
// Orchestrates a hyperparameter search:
//
//   Step 1: Load prepared data          (Layer 4 - data)
//   Step 2: Load / default search space (Layer 7 - tuning)
//   Step 3: Build the trainer           (Layer 5 - ml)
//   Step 4: Open or resume the session  (Layer 7 - tuning)
//   Step 5: Run trials until done       (Layer 7 → Layer 5)
//
// Output files under `output_dir`:
//   tuner_state.json, tuner_results.csv, tuner_results_sorted.csv,
//   best_hp.json, best_model.mpk, metrics.csv

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::{datasets::{load_datasets, DataConfig}, train_use_case::RunOptions};
use crate::ml::trainer::{FaceTrainer, TrainSettings};
use crate::tuning::{
    search::SearchAlgorithm,
    session::{TuneSettings, TuneSummary, TuningSession},
    space::SearchSpace,
};

pub const STATE_FILE: &str = "tuner_state.json";
pub const RESULTS_FILE: &str = "tuner_results.csv";
pub const BEST_HP_FILE: &str = "best_hp.json";

#[derive(Debug, Clone)]
pub struct TuneConfig {
    pub data:       DataConfig,
    pub run:        RunOptions,
    /// None = built-in default space
    pub space_path: Option<PathBuf>,
    pub algorithm:  SearchAlgorithm,
    pub seed:       u64,
    pub max_trials: usize,
    /// Ignore any saved search state and start over
    pub fresh:      bool,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            data:       DataConfig::default(),
            run:        RunOptions::default(),
            space_path: None,
            algorithm:  SearchAlgorithm::Grid,
            seed:       0,
            max_trials: 100,
            fresh:      false,
        }
    }
}

impl TuneConfig {
    /// True when `execute` will pick up a saved search instead of starting over.
    pub fn resumes(&self) -> bool {
        !self.fresh && self.run.output_dir.join(STATE_FILE).exists()
    }

    pub fn session_settings(&self) -> TuneSettings {
        let dir = &self.run.output_dir;
        TuneSettings {
            state_path:     dir.join(STATE_FILE),
            results_path:   dir.join(RESULTS_FILE),
            best_hp_path:   dir.join(BEST_HP_FILE),
            algorithm:      self.algorithm,
            seed:           self.seed,
            max_trials:     self.max_trials,
            metric:         self.run.metric,
            mode:           self.run.metric.natural_mode(),
            load_if_exists: !self.fresh,
        }
    }
}

pub struct TuneUseCase {
    config: TuneConfig,
}

impl TuneUseCase {
    pub fn new(config: TuneConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TuneSummary> {
        let cfg = &self.config;

        // ── Step 1: Data ──────────────────────────────────────────────────────
        let (train, val) = load_datasets(&cfg.data)?;

        // ── Step 2: Search space ──────────────────────────────────────────────
        let space = match &cfg.space_path {
            Some(path) => SearchSpace::load(path)?,
            None => {
                tracing::info!("No search space file given, using the default space");
                SearchSpace::face_default()
            }
        };

        // ── Step 3: Trainer ───────────────────────────────────────────────────
        // a new search starts metrics.csv over; a resumed one keeps its rows
        let settings = TrainSettings {
            reset_metrics: !cfg.resumes(),
            ..cfg.run.train_settings(train.labels())?
        };
        let mut trainer = FaceTrainer::<B>::new(settings, train, val, device)?;

        // ── Step 4 + 5: Session ───────────────────────────────────────────────
        let mut session = TuningSession::open(space, cfg.session_settings())?;
        tracing::info!(
            "Search: {} algorithm, {} trials ({} already scored), target {} ({})",
            cfg.algorithm,
            session.capacity(),
            session.state().scored().count(),
            cfg.run.metric,
            cfg.run.metric.natural_mode(),
        );
        session.run(&mut trainer)
    }
}
