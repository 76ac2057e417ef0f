// ============================================================
// Layer 7 — Tuning Session
// ============================================================
// Runs trials one after another until the searcher's capacity
// is reached:
//
//   sample(index) ──► HyperParams ──► state: running (saved)
//        ──► TrialRunner::run_trial ──► state: scored (saved)
//        ──► results row + sorted table
//        ──► best-configuration file (if new best)
//        ──► timing logged
//
// The saved state is the record of truth. A failing trial aborts
// the search; its `running` record stays on disk and is dropped
// (then re-run) on the next resume. Opening a session rebuilds
// the results table and the best-configuration file from the
// state, so bookkeeping cut short after a trial was scored is
// redone without running the trial again.

use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::domain::{
    hyperparams::HyperParams,
    metric::{Metric, MetricMode},
    traits::TrialRunner,
};
use crate::infra::checkpoint::save_hyperparams;
use crate::tuning::{
    results::ResultsTable,
    search::{SearchAlgorithm, Searcher},
    space::{to_overrides, SearchSpace},
    state::{SearchState, TrialRecord, TrialStatus},
};

/// Paths and search options for one session.
#[derive(Debug, Clone)]
pub struct TuneSettings {
    pub state_path:     PathBuf,
    pub results_path:   PathBuf,
    pub best_hp_path:   PathBuf,
    pub algorithm:      SearchAlgorithm,
    pub seed:           u64,
    pub max_trials:     usize,
    pub metric:         Metric,
    pub mode:           MetricMode,
    /// Resume from `state_path` when it exists
    pub load_if_exists: bool,
}

/// Outcome of `TuningSession::run`.
#[derive(Debug, Clone)]
pub struct TuneSummary {
    pub trials_this_session: usize,
    pub total_trials:        usize,
    pub best:                Option<TrialRecord>,
    pub elapsed_secs:        f64,
}

pub struct TuningSession {
    settings:            TuneSettings,
    searcher:            Searcher,
    state:               SearchState,
    results:             ResultsTable,
    started_at:          Instant,
    trials_this_session: usize,
    /// (index, score) of the best trial so far, resumed ones included
    best:                Option<(usize, f64)>,
}

impl TuningSession {
    pub fn open(space: SearchSpace, settings: TuneSettings) -> Result<Self> {
        let searcher = Searcher::new(&space, settings.algorithm, settings.seed)?;
        let fresh_state = SearchState::new(settings.algorithm, settings.seed, space, settings.metric, settings.mode);

        let resume = settings.load_if_exists && settings.state_path.exists();
        let state = if resume {
            let mut saved = SearchState::load(&settings.state_path)?;
            saved.check_compatible(&fresh_state)?;
            let dropped = saved.drop_unfinished();
            if dropped > 0 {
                tracing::warn!("Dropped {} unfinished trial(s) from the saved search", dropped);
            }
            tracing::info!(
                "Resuming {} search from '{}' ({} trials done)",
                saved.algorithm,
                settings.state_path.display(),
                saved.trials.len(),
            );
            saved
        } else {
            tracing::info!("Starting a new {} search", settings.algorithm);
            fresh_state
        };

        let columns = state.space.names().map(String::from).collect();
        let results = ResultsTable::open(&settings.results_path, columns, settings.metric, &state.trials)?;
        results.write_sorted(&state.trials, settings.mode)?;

        let best = state.best().map(|t| (t.index, t.score()));
        if let Some(best) = state.best() {
            restore_best_hyperparams(&settings.best_hp_path, best);
        }

        Ok(Self {
            settings,
            searcher,
            state,
            results,
            started_at: Instant::now(),
            trials_this_session: 0,
            best,
        })
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Trials this search will run in total, resumed ones included.
    pub fn capacity(&self) -> usize {
        self.searcher.capacity(self.settings.max_trials)
    }

    pub fn run<R: TrialRunner + ?Sized>(&mut self, runner: &mut R) -> Result<TuneSummary> {
        let capacity = self.capacity();
        if self.state.trials.len() >= capacity {
            tracing::info!("All {} trials already done", capacity);
        }

        while self.state.trials.len() < capacity {
            self.run_one(runner, capacity)?;
        }

        let summary = TuneSummary {
            trials_this_session: self.trials_this_session,
            total_trials:        self.state.trials.len(),
            best:                self.state.best().cloned(),
            elapsed_secs:        self.started_at.elapsed().as_secs_f64(),
        };
        tracing::info!(
            "Search finished: {} trials ({} this session) in {:.1}s",
            summary.total_trials,
            summary.trials_this_session,
            summary.elapsed_secs,
        );
        Ok(summary)
    }

    fn run_one<R: TrialRunner + ?Sized>(&mut self, runner: &mut R, capacity: usize) -> Result<()> {
        let index = self.state.trials.len();
        let params = self.searcher.sample(index);
        let hp = HyperParams::with_overrides(&to_overrides(&params))
            .with_context(|| format!("Trial {index} sampled an invalid configuration"))?;

        // ── running: persisted before training ────────────────────────────────
        let mut record = TrialRecord::pending(index, params);
        record.status = TrialStatus::Running;
        self.state.trials.push(record);
        self.state.save(&self.settings.state_path)?;
        tracing::info!("Trial {}/{}: {:?}", index + 1, capacity, self.state.trials[index].params);

        let started = Instant::now();
        let score = runner
            .run_trial(index, &hp)
            .with_context(|| format!("Trial {index} failed"))?;
        let elapsed = started.elapsed().as_secs_f64();

        // ── scored: persisted before any other bookkeeping ────────────────────
        let record = &mut self.state.trials[index];
        record.status = TrialStatus::Scored;
        record.metric = Some(score);
        record.elapsed_secs = Some(elapsed);
        self.trials_this_session += 1;
        self.state.save(&self.settings.state_path)?;

        self.results.append(&self.state.trials[index])?;
        self.results.write_sorted(&self.state.trials, self.settings.mode)?;
        tracing::debug!("Rewrote '{}'", self.results.sorted_path().display());

        let improved = self.settings.mode.improves_on(score, self.best.map(|(_, s)| s));
        if improved {
            self.best = Some((index, score));
            save_hyperparams(&self.settings.best_hp_path, &hp)?;
            tracing::info!(
                "New best {} = {:.4}, saved '{}'",
                self.settings.metric,
                score,
                self.settings.best_hp_path.display(),
            );
        }

        let total = self.started_at.elapsed().as_secs_f64();
        let remaining = capacity - self.state.trials.len();
        let eta = total / self.trials_this_session as f64 * remaining as f64;
        tracing::info!(
            "Trial {} took {:.1}s | {} = {:.4} | best {:.4} (trial {}) | session {:.1}s | ~{:.0}s left",
            index,
            elapsed,
            self.settings.metric,
            score,
            self.best.map_or(f64::NAN, |(_, s)| s),
            self.best.map_or(0, |(i, _)| i),
            total,
            eta,
        );
        Ok(())
    }
}

/// Rewrite the best-configuration file from a resumed search's best trial.
/// Failure only warns; the next improving trial writes it again.
fn restore_best_hyperparams(path: &Path, best: &TrialRecord) {
    let restored = HyperParams::with_overrides(&to_overrides(&best.params))
        .map_err(anyhow::Error::from)
        .and_then(|hp| save_hyperparams(path, &hp));
    if let Err(e) = restored {
        tracing::warn!("Cannot restore '{}' from trial {}: {:#}", path.display(), best.index, e);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FaceError;
    use crate::infra::checkpoint::load_hyperparams;
    use crate::tuning::space::{Assignment, ParamSpec};

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with("dense_units", ParamSpec::choice([64i64, 128, 256]))
            .with("dropout_rate", ParamSpec::range(0.0, 0.3, 4))
    }

    fn settings(dir: &Path, algorithm: SearchAlgorithm, max_trials: usize) -> TuneSettings {
        TuneSettings {
            state_path:     dir.join("tuner_state.json"),
            results_path:   dir.join("tuner_results.csv"),
            best_hp_path:   dir.join("best_hp.json"),
            algorithm,
            seed:           3,
            max_trials,
            metric:         Metric::ValAcc,
            mode:           MetricMode::Max,
            load_if_exists: true,
        }
    }

    /// Score peaks at dense_units 128, dropout 0.1.
    fn score(_trial: usize, hp: &HyperParams) -> Result<f64> {
        Ok(1.0 - (hp.dense_units as f64 - 128.0).abs() / 1000.0 - (hp.dropout_rate - 0.1).abs())
    }

    fn params(state: &SearchState) -> Vec<Assignment> {
        state.trials.iter().map(|t| t.params.clone()).collect()
    }

    #[test]
    fn test_grid_search_runs_every_point_and_keeps_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = TuningSession::open(space(), settings(dir.path(), SearchAlgorithm::Grid, 100)).unwrap();
        let summary = session.run(&mut score).unwrap();

        assert_eq!(summary.total_trials, 12);
        assert_eq!(summary.trials_this_session, 12);
        let best = load_hyperparams(&dir.path().join("best_hp.json")).unwrap();
        assert_eq!(best.dense_units, 128);
        assert!((best.dropout_rate - 0.1).abs() < 1e-9);

        let rows = std::fs::read_to_string(dir.path().join("tuner_results_sorted.csv")).unwrap();
        assert_eq!(rows.lines().count(), 13);
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let whole = tempfile::tempdir().unwrap();
        let mut session = TuningSession::open(space(), settings(whole.path(), SearchAlgorithm::Random, 6)).unwrap();
        session.run(&mut score).unwrap();
        let expected = params(session.state());

        let split = tempfile::tempdir().unwrap();
        let mut first = TuningSession::open(space(), settings(split.path(), SearchAlgorithm::Random, 3)).unwrap();
        first.run(&mut score).unwrap();

        let mut second = TuningSession::open(space(), settings(split.path(), SearchAlgorithm::Random, 6)).unwrap();
        let summary = second.run(&mut score).unwrap();
        assert_eq!(summary.trials_this_session, 3);
        assert_eq!(params(second.state()), expected);

        let rows = std::fs::read_to_string(split.path().join("tuner_results.csv")).unwrap();
        assert_eq!(rows.lines().count(), 7);
    }

    #[test]
    fn test_failed_trial_is_rerun_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let mut calls = 0;
        let mut flaky = |trial: usize, hp: &HyperParams| {
            calls += 1;
            if calls == 2 { anyhow::bail!("out of memory") } else { score(trial, hp) }
        };
        let mut session = TuningSession::open(space(), settings(dir.path(), SearchAlgorithm::Grid, 4)).unwrap();
        assert!(session.run(&mut flaky).is_err());

        let saved = SearchState::load(&dir.path().join("tuner_state.json")).unwrap();
        assert_eq!(saved.trials.len(), 2);
        assert_eq!(saved.trials[1].status, TrialStatus::Running);

        let mut resumed = TuningSession::open(space(), settings(dir.path(), SearchAlgorithm::Grid, 4)).unwrap();
        assert_eq!(resumed.state().trials.len(), 1);
        let summary = resumed.run(&mut score).unwrap();
        assert_eq!(summary.trials_this_session, 3);
        assert!(summary.best.is_some());
    }

    #[test]
    fn test_interrupted_bookkeeping_is_not_repeated_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), SearchAlgorithm::Grid, 3);
        // a directory where the best-configuration file should go makes
        // the first session fail right after trial 0 is scored
        std::fs::create_dir(&s.best_hp_path).unwrap();
        let mut first = TuningSession::open(space(), s.clone()).unwrap();
        assert!(first.run(&mut score).is_err());

        let saved = SearchState::load(&s.state_path).unwrap();
        assert_eq!(saved.trials.len(), 1);
        assert_eq!(saved.trials[0].status, TrialStatus::Scored);

        std::fs::remove_dir(&s.best_hp_path).unwrap();
        let mut resumed = TuningSession::open(space(), s.clone()).unwrap();
        assert!(s.best_hp_path.is_file());
        let summary = resumed.run(&mut score).unwrap();
        assert_eq!(summary.trials_this_session, 2);

        let csv = std::fs::read_to_string(&s.results_path).unwrap();
        let ids: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(load_hyperparams(&s.best_hp_path).unwrap().dense_units, 64);
    }

    #[test]
    fn test_changed_space_on_resume_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        TuningSession::open(space(), settings(dir.path(), SearchAlgorithm::Grid, 1))
            .unwrap()
            .run(&mut score)
            .unwrap();

        let other = SearchSpace::new().with("dense_units", ParamSpec::choice([32i64]));
        let err = TuningSession::open(other, settings(dir.path(), SearchAlgorithm::Grid, 1)).err().unwrap();
        assert!(matches!(err.downcast_ref::<FaceError>(), Some(FaceError::InvalidConfig(_))));
    }

    #[test]
    fn test_fresh_start_overwrites_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        TuningSession::open(space(), settings(dir.path(), SearchAlgorithm::Grid, 2))
            .unwrap()
            .run(&mut score)
            .unwrap();

        let fresh = TuneSettings { load_if_exists: false, ..settings(dir.path(), SearchAlgorithm::Grid, 2) };
        let mut session = TuningSession::open(space(), fresh).unwrap();
        assert!(session.state().trials.is_empty());
        assert_eq!(session.run(&mut score).unwrap().trials_this_session, 2);
    }

    #[test]
    fn test_unknown_parameter_in_space_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let bad = SearchSpace::new().with("l1_l2_reg", ParamSpec::choice([0.01f64]));
        let mut session = TuningSession::open(bad, settings(dir.path(), SearchAlgorithm::Grid, 1)).unwrap();
        assert!(session.run(&mut score).is_err());
    }
}
