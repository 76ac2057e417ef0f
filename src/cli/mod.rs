// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with `clap` and hands off to Layer 2.
//
//   (no subcommand) | tune — hyperparameter search
//   train                  — train from the best configuration
//
// The backend is chosen here, so everything below is generic
// over an AutodiffBackend.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use clap::Parser;
use commands::{BackendKind, Commands, TrainArgs, TuneArgs};

use crate::application::{
    train_use_case::TrainUseCase,
    tune_use_case::TuneUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "face-emotion",
    version,
    about = "Tune and train a facial-emotion classifier that fuses CNN features with face landmarks."
)]
pub struct Cli {
    /// Defaults to `tune` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Flags for the implicit `tune` command
    #[command(flatten)]
    pub tune: TuneArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Some(Commands::Tune(args))  => run_tune(args),
            Some(Commands::Train(args)) => run_train(args),
            None                        => run_tune(self.tune),
        }
    }
}

fn run_tune(args: TuneArgs) -> Result<()> {
    match args.run.backend {
        BackendKind::Wgpu    => tune_on::<Autodiff<Wgpu>>(args, WgpuDevice::default()),
        BackendKind::Ndarray => tune_on::<Autodiff<NdArray>>(args, NdArrayDevice::Cpu),
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    match args.run.backend {
        BackendKind::Wgpu    => train_on::<Autodiff<Wgpu>>(args, WgpuDevice::default()),
        BackendKind::Ndarray => train_on::<Autodiff<NdArray>>(args, NdArrayDevice::Cpu),
    }
}

fn tune_on<B: AutodiffBackend>(args: TuneArgs, device: B::Device) -> Result<()> {
    tracing::info!("Using device: {:?}", device);
    let summary = TuneUseCase::new(args.into()).execute::<B>(device)?;

    match summary.best {
        Some(best) => println!(
            "Search complete: {} trials. Best trial {} scored {:.4} with {:?}",
            summary.total_trials,
            best.index,
            best.score(),
            best.params,
        ),
        None => println!("Search complete: no trial was scored."),
    }
    Ok(())
}

fn train_on<B: AutodiffBackend>(args: TrainArgs, device: B::Device) -> Result<()> {
    tracing::info!("Using device: {:?}", device);
    let result = TrainUseCase::new(args.into()).execute::<B>(device)?;

    println!(
        "Training complete after {} epochs. Best {} = {:.4}",
        result.epochs.len(),
        result.metric,
        result.best_value().unwrap_or(f64::NAN),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::Metric;
    use crate::tuning::search::SearchAlgorithm;

    #[test]
    fn test_no_subcommand_means_tune() {
        let cli = Cli::try_parse_from(["face-emotion", "--algorithm", "random", "--seed", "9"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.tune.algorithm, SearchAlgorithm::Random);
        assert_eq!(cli.tune.seed, 9);
        assert_eq!(cli.tune.run.backend, BackendKind::Wgpu);
    }

    #[test]
    fn test_train_subcommand_flags() {
        let cli = Cli::try_parse_from([
            "face-emotion", "train", "--output-dir", "runs/x", "--backend", "ndarray", "--metric", "val_loss",
        ])
        .unwrap();
        let Some(Commands::Train(args)) = cli.command else { panic!("expected train") };
        assert_eq!(args.run.backend, BackendKind::Ndarray);
        assert_eq!(args.run.metric, Metric::ValLoss);

        let cfg: crate::application::train_use_case::TrainRunConfig = args.into();
        assert_eq!(cfg.best_hp_path, std::path::PathBuf::from("runs/x/best_hp.json"));
    }

    #[test]
    fn test_bad_algorithm_is_rejected() {
        assert!(Cli::try_parse_from(["face-emotion", "tune", "--algorithm", "tpe"]).is_err());
    }
}
