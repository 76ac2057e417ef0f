// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// searching for the best configuration, or training with it.
//
// Rules for this layer:
//   - No model code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Prepared data → (train, validation) datasets
pub mod datasets;

// The hyperparameter search workflow
pub mod tune_use_case;

// The train-with-best-configuration workflow
pub mod train_use_case;
