// ============================================================
// Layer 7 — Results Tables
// ============================================================
// Two CSV files per search:
//
//   tuner_results.csv         — one row per scored trial, in
//                               trial order; rebuilt from the
//                               search state on open, then
//                               appended to
//   tuner_results_sorted.csv  — all scored trials, best first,
//                               rewritten after every trial
//
// Columns: trial,<parameter names…>,<metric>,elapsed_secs

use anyhow::{Context, Result};
use std::{
    cmp::Ordering,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::metric::{Metric, MetricMode};
use crate::tuning::state::TrialRecord;

pub struct ResultsTable {
    path:        PathBuf,
    sorted_path: PathBuf,
    columns:     Vec<String>,
    header:      String,
}

impl ResultsTable {
    /// Writes the header plus a row for every scored trial in `trials`,
    /// replacing whatever the file held before.
    pub fn open(path: impl Into<PathBuf>, columns: Vec<String>, metric: Metric, trials: &[TrialRecord]) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let header = std::iter::once("trial".to_string())
            .chain(columns.iter().cloned())
            .chain([metric.to_string(), "elapsed_secs".to_string()])
            .collect::<Vec<_>>()
            .join(",");
        let sorted_path = sorted_path_for(&path);
        let table = Self { path, sorted_path, columns, header };

        let mut text = format!("{}\n", table.header);
        for trial in trials.iter().filter(|t| t.is_scored()) {
            text.push_str(&table.row(trial));
            text.push('\n');
        }
        fs::write(&table.path, text)
            .with_context(|| format!("Cannot create results table '{}'", table.path.display()))?;
        tracing::debug!("Opened results table '{}'", table.path.display());
        Ok(table)
    }

    pub fn sorted_path(&self) -> &Path {
        &self.sorted_path
    }

    pub fn append(&self, trial: &TrialRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open results table '{}'", self.path.display()))?;
        writeln!(f, "{}", self.row(trial))?;
        Ok(())
    }

    /// Rewrite the sorted copy from every scored trial. NaN scores sink to the bottom.
    pub fn write_sorted(&self, trials: &[TrialRecord], mode: MetricMode) -> Result<()> {
        let mut scored: Vec<&TrialRecord> = trials.iter().filter(|t| t.is_scored()).collect();
        scored.sort_by(|a, b| rank(a.score(), b.score(), mode));

        let mut text = format!("{}\n", self.header);
        for trial in scored {
            text.push_str(&self.row(trial));
            text.push('\n');
        }
        fs::write(&self.sorted_path, text)
            .with_context(|| format!("Cannot write '{}'", self.sorted_path.display()))
    }

    fn row(&self, trial: &TrialRecord) -> String {
        let mut fields = vec![trial.index.to_string()];
        for column in &self.columns {
            fields.push(trial.params.get(column).map(|v| csv_field(&v.to_string())).unwrap_or_default());
        }
        fields.push(format!("{:.6}", trial.score()));
        fields.push(format!("{:.1}", trial.elapsed_secs.unwrap_or(f64::NAN)));
        fields.join(",")
    }
}

/// `dir/name.csv` → `dir/name_sorted.csv`
pub fn sorted_path_for(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    path.with_file_name(format!("{stem}_sorted.csv"))
}

/// Best first per mode, NaN last; stable for equal scores.
fn rank(a: f64, b: f64, mode: MetricMode) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true)   => Ordering::Equal,
        (true, false)  => Ordering::Greater,
        (false, true)  => Ordering::Less,
        (false, false) => match mode {
            MetricMode::Max => b.total_cmp(&a),
            MetricMode::Min => a.total_cmp(&b),
        },
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
