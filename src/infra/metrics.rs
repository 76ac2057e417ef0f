// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch. Each row carries the label of
// its training run (`trial_<index>` during a search, `best` for
// the final run) so a whole search can share one file.
//
// Example CSV output:
//   run,epoch,train_loss,train_acc,val_loss,val_acc,lr
//   trial_0,1,1.912300,0.241000,1.854300,0.262000,1.000000e-4
//   trial_0,2,1.690100,0.334000,1.701200,0.318000,1.000000e-4
//   ...
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::metric::EpochRecord;

const HEADER: &str = "run,epoch,train_loss,train_acc,val_loss,val_acc,lr";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet or `fresh`
    /// is set (dropping old rows), otherwise appends to the existing log.
    pub fn new(dir: impl AsRef<Path>, fresh: bool) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if fresh || !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, run: &str, m: &EpochRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6e}",
            run, m.epoch, m.train_loss, m.train_acc, m.val_loss, m.val_acc, m.lr,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochRecord {
        EpochRecord { epoch, train_loss: 1.5, train_acc: 0.25, val_loss: 1.75, val_acc: 0.5, lr: 1e-4 }
    }

    #[test]
    fn test_rows_are_appended_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path(), false).unwrap().log("trial_0", &record(1)).unwrap();
        let logger = MetricsLogger::new(dir.path(), false).unwrap();
        logger.log("trial_1", &record(1)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "trial_0,1,1.500000,0.250000,1.750000,0.500000,1.000000e-4");
        assert!(lines[2].starts_with("trial_1,1,"));
    }

    #[test]
    fn test_fresh_logger_drops_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path(), false).unwrap().log("trial_0", &record(1)).unwrap();

        let logger = MetricsLogger::new(dir.path(), true).unwrap();
        logger.log("trial_0", &record(1)).unwrap();
        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("trial_0,")).count(), 1);
    }
}
