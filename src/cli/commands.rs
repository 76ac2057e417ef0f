// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands, `tune` and `train`, sharing the data and
// run flags. clap's derive macros generate help text, error
// messages and type conversion.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    datasets::DataConfig,
    train_use_case::{RunOptions, TrainRunConfig},
    tune_use_case::{TuneConfig, BEST_HP_FILE},
};
use crate::domain::metric::Metric;
use crate::tuning::search::SearchAlgorithm;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for the best hyperparameters (the default command)
    Tune(TuneArgs),

    /// Train once with the best hyperparameters found by `tune`
    Train(TrainArgs),
}

/// Compute backend for tensors.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU via WGPU
    #[default]
    Wgpu,
    /// CPU via ndarray
    Ndarray,
}

// ─── Shared flags ─────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Prepared training split (JSON)
    #[arg(long, default_value = "data/prepared/train.json")]
    pub train_data: PathBuf,

    /// Prepared validation split; omit to split the training file
    #[arg(long)]
    pub val_data: Option<PathBuf>,

    /// Fraction held out for validation when --val-data is omitted
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    /// Seed for the train/validation shuffle
    #[arg(long, default_value_t = 42)]
    pub split_seed: u64,

    /// Disable training-time image augmentation
    #[arg(long)]
    pub no_augment: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory for checkpoints, metrics and search files
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Directory of pretrained backbone records (<name>.mpk)
    #[arg(long)]
    pub weights_dir: Option<PathBuf>,

    /// Metric returned by each training run
    #[arg(long, default_value = "val_acc")]
    pub metric: Metric,

    /// Weight the loss by inverse class frequency
    #[arg(long)]
    pub balanced_weights: bool,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

// ─── tune ─────────────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct TuneArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Search-space JSON; omit for the built-in space
    #[arg(long)]
    pub space: Option<PathBuf>,

    /// grid | random
    #[arg(long, default_value = "grid")]
    pub algorithm: SearchAlgorithm,

    /// Seed for random search
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value_t = 100)]
    pub max_trials: usize,

    /// Start a new search even if a saved one exists
    #[arg(long)]
    pub fresh: bool,
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Best-configuration file; defaults to <output-dir>/best_hp.json
    #[arg(long)]
    pub best_hp: Option<PathBuf>,
}

// ─── Conversions into application configs ─────────────────────────────────────
// The application layer never sees clap types.
impl From<DataArgs> for DataConfig {
    fn from(a: DataArgs) -> Self {
        DataConfig {
            train_path:   a.train_data,
            val_path:     a.val_data,
            val_fraction: a.val_fraction,
            split_seed:   a.split_seed,
            augment:      !a.no_augment,
        }
    }
}

impl From<RunArgs> for RunOptions {
    fn from(a: RunArgs) -> Self {
        RunOptions {
            output_dir:       a.output_dir,
            weights_dir:      a.weights_dir,
            metric:           a.metric,
            balanced_weights: a.balanced_weights,
            num_workers:      a.num_workers,
        }
    }
}

impl From<TuneArgs> for TuneConfig {
    fn from(a: TuneArgs) -> Self {
        TuneConfig {
            data:       a.data.into(),
            run:        a.run.into(),
            space_path: a.space,
            algorithm:  a.algorithm,
            seed:       a.seed,
            max_trials: a.max_trials,
            fresh:      a.fresh,
        }
    }
}

impl From<TrainArgs> for TrainRunConfig {
    fn from(a: TrainArgs) -> Self {
        let best_hp_path = a.best_hp.unwrap_or_else(|| a.run.output_dir.join(BEST_HP_FILE));
        TrainRunConfig {
            data: a.data.into(),
            run:  a.run.into(),
            best_hp_path,
        }
    }
}
