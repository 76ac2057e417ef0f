// ============================================================
// Layer 7 — Hyperparameter Tuning
// ============================================================
// Search over HyperParams by repeatedly calling a TrialRunner.
//
//   space.rs   — search-space description and its expansion
//   search.rs  — grid and seeded random searchers
//   state.rs   — resumable on-disk record of every trial
//   results.rs — per-trial CSV table and its sorted copy
//   session.rs — the trial loop tying the above together
//
// The tuner never touches Burn: it only sees the TrialRunner
// trait, so it is tested with plain closures.

pub mod space;
pub mod search;
pub mod state;
pub mod results;
pub mod session;
