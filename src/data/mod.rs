// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from preprocessed arrays on disk to device-ready
// tensor batches.
//
//   prepared JSON split
//       │
//       ▼
//   PreparedSplit     → parallel images / landmarks / labels
//       │
//       ▼
//   FaceDataset       → implements Burn's Dataset trait,
//       │               augments the image on every fetch
//       ▼
//   FaceBatcher       → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Stochastic image augmentation pipeline
pub mod augment;

/// Implements Burn's Dataset trait for face samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Loads and saves preprocessed splits
pub mod store;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
