// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn module and training code lives here.
//
//   backbone/    — convolutional feature extractors selected by
//                  name (ResNet family, VGG, AlexNet, DenseNet,
//                  MobileNetV2, MNASNet, SqueezeNet, ShuffleNet,
//                  GoogLeNet), classifier heads removed
//
//   fusion.rs    — joins backbone features with landmark
//                  features and projects to emotion logits;
//                  weighted cross-entropy + accuracy
//
//   callbacks.rs — checkpoint, LR-on-plateau and early stopping,
//                  each with its own monitor state
//
//   trainer.rs   — the per-trial epoch loop
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backbone selector and feature-extractor families
pub mod backbone;

/// Landmark fusion head and loss
pub mod fusion;

/// Per-epoch training callbacks
pub mod callbacks;

/// Full training loop with validation and callbacks
pub mod trainer;
