// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file formats used by several layers:
//
//   checkpoint.rs — model weights via Burn's CompactRecorder,
//                   and the best-configuration JSON file
//
//   metrics.rs    — per-epoch metrics appended to a CSV file
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving/loading and the best-configuration file
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
