// ============================================================
// Layer 7 — Searchers
// ============================================================
// A searcher turns a trial index into an assignment. Both
// algorithms are pure functions of (space, seed, index), so a
// resumed search samples exactly what an uninterrupted one
// would have sampled next.
//
//   Grid   — index i is the i-th point of the cartesian
//            product of all axes, first name outermost
//   Random — each parameter drawn uniformly from its values
//            with an RNG seeded from (seed, i)

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::{FaceError, FaceResult};
use crate::tuning::space::{Assignment, ParamValue, SearchSpace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAlgorithm {
    Grid,
    Random,
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchAlgorithm::Grid   => "grid",
            SearchAlgorithm::Random => "random",
        })
    }
}

impl FromStr for SearchAlgorithm {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid"   => Ok(SearchAlgorithm::Grid),
            "random" => Ok(SearchAlgorithm::Random),
            other => Err(FaceError::InvalidConfig(format!("unknown search algorithm '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Searcher {
    axes:      Vec<(String, Vec<ParamValue>)>,
    algorithm: SearchAlgorithm,
    seed:      u64,
}

impl Searcher {
    pub fn new(space: &SearchSpace, algorithm: SearchAlgorithm, seed: u64) -> FaceResult<Self> {
        Ok(Self { axes: space.axes()?, algorithm, seed })
    }

    /// Number of distinct grid points (1 for an empty space).
    pub fn grid_size(&self) -> usize {
        self.axes.iter().fold(1usize, |n, (_, values)| n.saturating_mul(values.len()))
    }

    /// How many trials a search asked for `max_trials` will run.
    pub fn capacity(&self, max_trials: usize) -> usize {
        match self.algorithm {
            SearchAlgorithm::Grid   => max_trials.min(self.grid_size()),
            SearchAlgorithm::Random => max_trials,
        }
    }

    pub fn sample(&self, index: usize) -> Assignment {
        match self.algorithm {
            SearchAlgorithm::Grid   => self.grid_point(index),
            SearchAlgorithm::Random => self.random_point(index),
        }
    }

    /// Mixed-radix decoding of `index`, last axis fastest.
    fn grid_point(&self, index: usize) -> Assignment {
        let mut rest = index % self.grid_size();
        let mut picks = vec![0usize; self.axes.len()];
        for (slot, (_, values)) in picks.iter_mut().zip(&self.axes).rev() {
            *slot = rest % values.len();
            rest /= values.len();
        }
        self.axes
            .iter()
            .zip(picks)
            .map(|((name, values), pick)| (name.clone(), values[pick].clone()))
            .collect()
    }

    fn random_point(&self, index: usize) -> Assignment {
        let mut rng = StdRng::seed_from_u64(trial_seed(self.seed, index));
        self.axes
            .iter()
            .map(|(name, values)| (name.clone(), values[rng.gen_range(0..values.len())].clone()))
            .collect()
    }
}

/// SplitMix-style mix so neighbouring indices get unrelated streams.
fn trial_seed(seed: u64, index: usize) -> u64 {
    let mut z = seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::space::ParamSpec;
    use std::collections::HashSet;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with("a", ParamSpec::choice([1i64, 2]))
            .with("b", ParamSpec::choice(["x", "y", "z"]))
    }

    #[test]
    fn test_grid_enumerates_cartesian_product() {
        let s = Searcher::new(&space(), SearchAlgorithm::Grid, 0).unwrap();
        assert_eq!(s.grid_size(), 6);

        let first = s.sample(0);
        assert_eq!(first["a"], ParamValue::Int(1));
        assert_eq!(first["b"], ParamValue::from("x"));
        let second = s.sample(1);
        assert_eq!(second["a"], ParamValue::Int(1));
        assert_eq!(second["b"], ParamValue::from("y"));

        let all: HashSet<String> = (0..6).map(|i| format!("{:?}", s.sample(i))).collect();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_grid_capacity_is_capped() {
        let s = Searcher::new(&space(), SearchAlgorithm::Grid, 0).unwrap();
        assert_eq!(s.capacity(100), 6);
        assert_eq!(s.capacity(4), 4);
        let r = Searcher::new(&space(), SearchAlgorithm::Random, 0).unwrap();
        assert_eq!(r.capacity(100), 100);
    }

    #[test]
    fn test_random_is_a_function_of_seed_and_index() {
        let a = Searcher::new(&space(), SearchAlgorithm::Random, 7).unwrap();
        let b = Searcher::new(&space(), SearchAlgorithm::Random, 7).unwrap();
        for i in [0, 3, 11, 40] {
            assert_eq!(a.sample(i), b.sample(i));
        }
        // order of calls does not matter
        let later = a.sample(40);
        let _ = a.sample(0);
        assert_eq!(a.sample(40), later);
    }

    #[test]
    fn test_empty_space_has_one_empty_point() {
        let s = Searcher::new(&SearchSpace::new(), SearchAlgorithm::Grid, 0).unwrap();
        assert_eq!(s.grid_size(), 1);
        assert!(s.sample(0).is_empty());
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("random".parse::<SearchAlgorithm>().unwrap(), SearchAlgorithm::Random);
        assert!("tpe".parse::<SearchAlgorithm>().is_err());
    }
}
