// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failures raised by the model, data and tuning layers.
// The CLI and use cases wrap these in anyhow with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceError {
    /// Backbone name is not one of the known variants
    #[error("invalid model name '{0}'")]
    UnknownBackbone(String),

    /// Backbone name is known but cannot be built
    #[error("backbone '{0}' is not supported")]
    UnsupportedBackbone(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Parallel sequences (images, landmarks, labels) disagree in length
    #[error("length mismatch: {what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what:     &'static str,
        expected: usize,
        found:    usize,
    },
}

pub type FaceResult<T> = std::result::Result<T, FaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let e = FaceError::UnknownBackbone("resnet9000".into());
        assert!(e.to_string().contains("resnet9000"));

        let e = FaceError::IndexOutOfBounds { index: 7, len: 3 };
        assert_eq!(e.to_string(), "index 7 out of bounds for dataset of length 3");
    }
}
