// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Think of this layer as the "dictionary" of the system:
// it defines what things ARE, not how they work.

/// Typed error enum shared by all layers
pub mod error;

/// Emotion classes and the class count
pub mod emotion;

/// The per-trial configuration record
pub mod hyperparams;

/// Monitored metrics, epoch records and trial results
pub mod metric;

/// Image shape and the (image, landmarks, label) sample tuple
pub mod sample;

/// Core abstractions (traits) that other layers implement
pub mod traits;
