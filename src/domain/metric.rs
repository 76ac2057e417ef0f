// ============================================================
// Layer 3 — Metrics and Trial Results
// ============================================================
// A trial monitors one metric in one direction (max / min).
// Each epoch appends an EpochRecord; the tuner ranks trials
// by TrialResult::best_value().

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::FaceError;

// ─── MetricMode ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricMode {
    Max,
    Min,
}

impl MetricMode {
    /// Strict comparison in this mode's direction. NaN is never better.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            MetricMode::Max => candidate > incumbent,
            MetricMode::Min => candidate < incumbent,
        }
    }

    /// Like `is_better`, but a missing incumbent always loses to a real number.
    pub fn improves_on(self, candidate: f64, incumbent: Option<f64>) -> bool {
        if candidate.is_nan() {
            return false;
        }
        match incumbent {
            None       => true,
            Some(best) => self.is_better(candidate, best),
        }
    }
}

impl fmt::Display for MetricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricMode::Max => "max",
            MetricMode::Min => "min",
        })
    }
}

impl FromStr for MetricMode {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(MetricMode::Max),
            "min" => Ok(MetricMode::Min),
            other => Err(FaceError::InvalidConfig(format!("unknown metric mode '{other}'"))),
        }
    }
}

// ─── Metric ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrainLoss,
    TrainAcc,
    ValLoss,
    ValAcc,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::TrainLoss => "train_loss",
            Metric::TrainAcc  => "train_acc",
            Metric::ValLoss   => "val_loss",
            Metric::ValAcc    => "val_acc",
        }
    }

    /// Losses are minimised, accuracies maximised.
    pub fn natural_mode(self) -> MetricMode {
        match self {
            Metric::TrainLoss | Metric::ValLoss => MetricMode::Min,
            Metric::TrainAcc  | Metric::ValAcc  => MetricMode::Max,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train_loss" => Ok(Metric::TrainLoss),
            "train_acc"  => Ok(Metric::TrainAcc),
            "val_loss"   => Ok(Metric::ValLoss),
            "val_acc"    => Ok(Metric::ValAcc),
            other => Err(FaceError::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

// ─── EpochRecord ──────────────────────────────────────────────────────────────
/// Scalars measured at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based
    pub epoch:      usize,
    pub train_loss: f64,
    pub train_acc:  f64,
    pub val_loss:   f64,
    pub val_acc:    f64,
    /// Learning rate used during this epoch
    pub lr:         f64,
}

impl EpochRecord {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TrainLoss => self.train_loss,
            Metric::TrainAcc  => self.train_acc,
            Metric::ValLoss   => self.val_loss,
            Metric::ValAcc    => self.val_acc,
        }
    }
}

// ─── TrialResult ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub metric: Metric,
    pub mode:   MetricMode,
    pub epochs: Vec<EpochRecord>,
}

impl TrialResult {
    pub fn new(metric: Metric, mode: MetricMode) -> Self {
        Self { metric, mode, epochs: Vec::new() }
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    /// Best value of the monitored metric across all epochs (per mode).
    /// None when no epoch produced a comparable (non-NaN) value.
    pub fn best_value(&self) -> Option<f64> {
        self.epochs
            .iter()
            .map(|r| r.value(self.metric))
            .fold(None, |best, v| {
                if self.mode.improves_on(v, best) { Some(v) } else { best }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, val_acc: f64, train_loss: f64) -> EpochRecord {
        EpochRecord { epoch, train_loss, train_acc: 0.0, val_loss: 0.0, val_acc, lr: 1e-3 }
    }

    #[test]
    fn test_improves_on_first_value() {
        assert!(MetricMode::Max.improves_on(0.1, None));
        assert!(MetricMode::Min.improves_on(10.0, None));
        assert!(!MetricMode::Max.improves_on(f64::NAN, None));
    }

    #[test]
    fn test_equal_value_is_not_an_improvement() {
        assert!(!MetricMode::Max.improves_on(0.5, Some(0.5)));
        assert!(!MetricMode::Min.improves_on(0.5, Some(0.5)));
    }

    #[test]
    fn test_best_value_respects_mode() {
        let mut r = TrialResult::new(Metric::ValAcc, MetricMode::Max);
        r.push(record(1, 0.3, 2.0));
        r.push(record(2, 0.6, 1.5));
        r.push(record(3, 0.5, 1.0));
        assert_eq!(r.best_value(), Some(0.6));

        let mut r = TrialResult::new(Metric::TrainLoss, MetricMode::Min);
        r.push(record(1, 0.3, 2.0));
        r.push(record(2, 0.6, 1.0));
        assert_eq!(r.best_value(), Some(1.0));
    }

    #[test]
    fn test_empty_trial_has_no_best() {
        let r = TrialResult::new(Metric::ValAcc, MetricMode::Max);
        assert_eq!(r.best_value(), None);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("val_acc".parse::<Metric>().unwrap(), Metric::ValAcc);
        assert_eq!(Metric::ValLoss.natural_mode(), MetricMode::Min);
        assert!("accuracy".parse::<Metric>().is_err());
    }
}
