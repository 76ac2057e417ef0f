// ============================================================
// Layer 7 — Persisted Search State
// ============================================================
// Everything needed to resume a search after the process dies:
// the algorithm, its seed, the search space, the target metric
// and every trial started so far.
//
//   pending ──► running ──► scored
//
// A trial is written as `running` before training starts and
// as `scored` after it returns. Trials still `running` (or
// `pending`) at the tail of a loaded state never finished and
// are dropped so they run again.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::domain::{
    error::{FaceError, FaceResult},
    metric::{Metric, MetricMode},
};
use crate::tuning::{
    search::SearchAlgorithm,
    space::{Assignment, SearchSpace},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Pending,
    Running,
    Scored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 0-based position in the search sequence
    pub index:        usize,
    pub params:       Assignment,
    pub status:       TrialStatus,
    /// None until scored; NaN scores are also stored as null
    pub metric:       Option<f64>,
    pub elapsed_secs: Option<f64>,
}

impl TrialRecord {
    pub fn pending(index: usize, params: Assignment) -> Self {
        Self { index, params, status: TrialStatus::Pending, metric: None, elapsed_secs: None }
    }

    pub fn is_scored(&self) -> bool {
        self.status == TrialStatus::Scored
    }

    /// Metric as a float; a scored trial without a value counts as NaN.
    pub fn score(&self) -> f64 {
        self.metric.unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub algorithm: SearchAlgorithm,
    pub seed:      u64,
    pub space:     SearchSpace,
    pub metric:    Metric,
    pub mode:      MetricMode,
    pub trials:    Vec<TrialRecord>,
}

impl SearchState {
    pub fn new(algorithm: SearchAlgorithm, seed: u64, space: SearchSpace, metric: Metric, mode: MetricMode) -> Self {
        Self { algorithm, seed, space, metric, mode, trials: Vec::new() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read search state '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed search state '{}'", path.display()))
    }

    /// Write to a sibling temp file, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write search state '{}'", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Cannot replace search state '{}'", path.display()))?;
        Ok(())
    }

    /// Refuse to resume a search that was started with different settings.
    pub fn check_compatible(&self, other: &SearchState) -> FaceResult<()> {
        let mismatch = |what: &str| {
            Err(FaceError::InvalidConfig(format!(
                "saved search used a different {what}; rerun with --fresh to start over"
            )))
        };
        if self.algorithm != other.algorithm {
            return mismatch("algorithm");
        }
        if self.algorithm == SearchAlgorithm::Random && self.seed != other.seed {
            return mismatch("seed");
        }
        if self.space != other.space {
            return mismatch("search space");
        }
        if self.metric != other.metric || self.mode != other.mode {
            return mismatch("target metric");
        }
        Ok(())
    }

    /// Drop trailing trials that never reached `scored`. Returns how many.
    pub fn drop_unfinished(&mut self) -> usize {
        let before = self.trials.len();
        while self.trials.last().is_some_and(|t| !t.is_scored()) {
            self.trials.pop();
        }
        before - self.trials.len()
    }

    pub fn scored(&self) -> impl Iterator<Item = &TrialRecord> {
        self.trials.iter().filter(|t| t.is_scored())
    }

    /// Best scored trial per mode; earliest wins ties.
    pub fn best(&self) -> Option<&TrialRecord> {
        self.scored().fold(None, |best: Option<&TrialRecord>, t| {
            if self.mode.improves_on(t.score(), best.map(TrialRecord::score)) { Some(t) } else { best }
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::space::{ParamSpec, ParamValue};

    fn state() -> SearchState {
        let space = SearchSpace::new().with("dense_units", ParamSpec::choice([64i64, 128]));
        SearchState::new(SearchAlgorithm::Grid, 1, space, Metric::ValAcc, MetricMode::Max)
    }

    fn scored(index: usize, metric: f64) -> TrialRecord {
        let mut params = Assignment::new();
        params.insert("dense_units".into(), ParamValue::Int(64));
        TrialRecord { status: TrialStatus::Scored, metric: Some(metric), elapsed_secs: Some(1.0), ..TrialRecord::pending(index, params) }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut s = state();
        s.trials.push(scored(0, 0.5));
        s.save(&path).unwrap();
        assert_eq!(SearchState::load(&path).unwrap(), s);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_float_params_reload_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut s = state();
        let mut trial = scored(0, 0.1 + 0.2);
        // linspace(0, 0.3, 4)[1], which lossy float parsing turns into 0.1
        trial.params.insert("dropout_rate".into(), ParamValue::Float(0.09999999999999999));
        s.trials.push(trial);
        s.save(&path).unwrap();

        let loaded = SearchState::load(&path).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.trials[0].params["dropout_rate"], ParamValue::Float(0.09999999999999999));
        assert_eq!(loaded.trials[0].metric.map(f64::to_bits), Some((0.1f64 + 0.2).to_bits()));
    }

    #[test]
    fn test_nan_score_survives_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut s = state();
        s.trials.push(scored(0, f64::NAN));
        s.save(&path).unwrap();
        let loaded = SearchState::load(&path).unwrap();
        assert!(loaded.trials[0].score().is_nan());
    }

    #[test]
    fn test_drop_unfinished_only_trims_the_tail() {
        let mut s = state();
        s.trials.push(scored(0, 0.1));
        s.trials.push(scored(1, 0.2));
        let mut running = TrialRecord::pending(2, Assignment::new());
        running.status = TrialStatus::Running;
        s.trials.push(running);

        assert_eq!(s.drop_unfinished(), 1);
        assert_eq!(s.trials.len(), 2);
        assert_eq!(s.drop_unfinished(), 0);
    }

    #[test]
    fn test_best_respects_mode_and_skips_nan() {
        let mut s = state();
        s.trials.push(scored(0, 0.4));
        s.trials.push(scored(1, f64::NAN));
        s.trials.push(scored(2, 0.7));
        s.trials.push(scored(3, 0.7));
        assert_eq!(s.best().map(|t| t.index), Some(2));

        s.mode = MetricMode::Min;
        assert_eq!(s.best().map(|t| t.index), Some(0));
    }

    #[test]
    fn test_changed_space_is_incompatible() {
        let saved = state();
        let mut current = state();
        current.space = SearchSpace::new().with("dense_units", ParamSpec::choice([64i64]));
        assert!(matches!(saved.check_compatible(&current), Err(FaceError::InvalidConfig(_))));

        let mut reseeded = state();
        reseeded.seed = 99;
        // seed only matters for random search
        assert!(saved.check_compatible(&reseeded).is_ok());
    }
}
