use serde::{Deserialize, Serialize};

/// Channel-first image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl ImageShape {
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of values in one CHW image.
    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

/// One training example: CHW image in [0, 1], landmark vector, class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub image:     Vec<f32>,
    pub landmarks: Vec<f32>,
    pub label:     usize,
}
