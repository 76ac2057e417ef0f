// ============================================================
// Layer 4 — Prepared Split Store
// ============================================================
// Reads and writes preprocessed face data: parallel arrays of
// CHW images (floats in [0,1]), landmark vectors and labels,
// serialised as one JSON document per split.
//
// Face detection and landmark extraction happen upstream; this
// module only persists their output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{augment::Augmentation, dataset::FaceDataset, splitter::split_train_val};
use crate::domain::sample::ImageShape;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedSplit {
    pub shape:     ImageShape,
    pub images:    Vec<Vec<f32>>,
    pub landmarks: Vec<Vec<f32>>,
    pub labels:    Vec<usize>,
}

impl PreparedSplit {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read prepared data '{}'", path.display()))?;
        let split: Self = serde_json::from_str(&json)
            .with_context(|| format!("Malformed prepared data '{}'", path.display()))?;
        tracing::info!("Loaded {} samples from '{}'", split.labels.len(), path.display());
        Ok(split)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(path, serde_json::to_string(self)?)
            .with_context(|| format!("Cannot write prepared data '{}'", path.display()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Shuffle with `seed` and split into (train, validation).
    pub fn split(self, train_fraction: f64, seed: u64) -> (Self, Self) {
        let Self { shape, images, landmarks, labels } = self;
        let rows: Vec<(Vec<f32>, Vec<f32>, usize)> = images
            .into_iter()
            .zip(landmarks)
            .zip(labels)
            .map(|((i, l), y)| (i, l, y))
            .collect();

        let (train, val) = split_train_val(rows, train_fraction, seed);
        (Self::from_rows(shape, train), Self::from_rows(shape, val))
    }

    fn from_rows(shape: ImageShape, rows: Vec<(Vec<f32>, Vec<f32>, usize)>) -> Self {
        let mut split = Self { shape, images: Vec::new(), landmarks: Vec::new(), labels: Vec::new() };
        for (image, landmarks, label) in rows {
            split.images.push(image);
            split.landmarks.push(landmarks);
            split.labels.push(label);
        }
        split
    }

    pub fn into_dataset(self, augmentation: Option<Augmentation>) -> Result<FaceDataset> {
        Ok(FaceDataset::new(self.images, self.landmarks, self.labels, self.shape, augmentation)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;

    fn split(n: usize) -> PreparedSplit {
        let shape = ImageShape::new(1, 2, 2);
        PreparedSplit {
            shape,
            images:    (0..n).map(|i| vec![i as f32 / 10.0; 4]).collect(),
            landmarks: (0..n).map(|i| vec![i as f32, -(i as f32)]).collect(),
            labels:    (0..n).map(|i| i % 7).collect(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/train.json");
        let original = split(6);
        original.save(&path).unwrap();
        assert_eq!(PreparedSplit::load(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PreparedSplit::load(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_split_keeps_rows_together() {
        let (train, val) = split(10).split(0.8, 7);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        for s in [&train, &val] {
            for ((img, land), label) in s.images.iter().zip(&s.landmarks).zip(&s.labels) {
                let i = land[0] as usize;
                assert_eq!(*label, i % 7);
                assert_eq!(img[0], i as f32 / 10.0);
            }
        }
    }

    #[test]
    fn test_into_dataset() {
        let ds = split(3).into_dataset(None).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.landmark_len(), 2);
    }
}
