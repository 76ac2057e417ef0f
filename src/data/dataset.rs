// ============================================================
// Layer 4 — Face Dataset (data generator)
// ============================================================
// Indexes three parallel sequences (images, landmark vectors,
// labels) and optionally augments the image on every fetch.
//
// Invariant: the three sequences have the same length, every
// image has shape.numel() values and every landmark vector has
// the same length. Checked once in FaceDataset::new.

use burn::data::dataset::Dataset;

use crate::data::augment::Augmentation;
use crate::domain::{
    error::{FaceError, FaceResult},
    sample::{FaceSample, ImageShape},
};

pub struct FaceDataset {
    images:       Vec<Vec<f32>>,
    landmarks:    Vec<Vec<f32>>,
    labels:       Vec<usize>,
    shape:        ImageShape,
    landmark_len: usize,
    augmentation: Option<Augmentation>,
}

impl FaceDataset {
    pub fn new(
        images:       Vec<Vec<f32>>,
        landmarks:    Vec<Vec<f32>>,
        labels:       Vec<usize>,
        shape:        ImageShape,
        augmentation: Option<Augmentation>,
    ) -> FaceResult<Self> {
        let n = images.len();
        if landmarks.len() != n {
            return Err(FaceError::LengthMismatch { what: "landmarks", expected: n, found: landmarks.len() });
        }
        if labels.len() != n {
            return Err(FaceError::LengthMismatch { what: "labels", expected: n, found: labels.len() });
        }
        if let Some(bad) = images.iter().find(|img| img.len() != shape.numel()) {
            return Err(FaceError::LengthMismatch { what: "image", expected: shape.numel(), found: bad.len() });
        }
        let landmark_len = landmarks.first().map_or(0, Vec::len);
        if let Some(bad) = landmarks.iter().find(|l| l.len() != landmark_len) {
            return Err(FaceError::LengthMismatch { what: "landmark vector", expected: landmark_len, found: bad.len() });
        }
        if augmentation.is_some() && !matches!(shape.channels, 1 | 3) {
            return Err(FaceError::InvalidConfig(format!(
                "augmentation needs 1 or 3 channels, got {}",
                shape.channels
            )));
        }

        match augmentation {
            Some(_) => tracing::info!("Image augmentation enabled ({} samples)", n),
            None    => tracing::debug!("Image augmentation disabled ({} samples)", n),
        }

        Ok(Self { images, landmarks, labels, shape, landmark_len, augmentation })
    }

    /// Fetch sample `index`, augmenting the image if configured.
    pub fn fetch(&self, index: usize) -> FaceResult<FaceSample> {
        let len = self.images.len();
        let image = self
            .images
            .get(index)
            .ok_or(FaceError::IndexOutOfBounds { index, len })?;

        let image = match &self.augmentation {
            Some(aug) => aug.augment_chw(image, self.shape, &mut rand::thread_rng()),
            None      => image.clone(),
        };

        Ok(FaceSample {
            image,
            landmarks: self.landmarks[index].clone(),
            label:     self.labels[index],
        })
    }

    pub fn shape(&self) -> ImageShape { self.shape }

    pub fn landmark_len(&self) -> usize { self.landmark_len }

    pub fn labels(&self) -> &[usize] { &self.labels }

    pub fn is_augmented(&self) -> bool { self.augmentation.is_some() }
}

impl Dataset<FaceSample> for FaceDataset {
    fn get(&self, index: usize) -> Option<FaceSample> {
        self.fetch(index).ok()
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> ImageShape {
        ImageShape::new(3, 4, 4)
    }

    fn dataset(n: usize, augmentation: Option<Augmentation>) -> FaceDataset {
        let images    = (0..n).map(|i| vec![i as f32 / n as f32; shape().numel()]).collect();
        let landmarks = (0..n).map(|i| vec![i as f32; 6]).collect();
        let labels    = (0..n).map(|i| i % 7).collect();
        FaceDataset::new(images, landmarks, labels, shape(), augmentation).unwrap()
    }

    #[test]
    fn test_fetch_keeps_index_alignment() {
        let ds = dataset(5, None);
        assert_eq!(ds.len(), 5);
        let s = ds.fetch(3).unwrap();
        assert_eq!(s.landmarks, vec![3.0; 6]);
        assert_eq!(s.label, 3);
        assert_eq!(s.image, vec![0.6; 48]);
    }

    #[test]
    fn test_out_of_range_fetch_fails() {
        let ds = dataset(2, None);
        assert!(matches!(ds.fetch(2), Err(FaceError::IndexOutOfBounds { index: 2, len: 2 })));
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = FaceDataset::new(
            vec![vec![0.0; 48]; 3],
            vec![vec![0.0; 6]; 3],
            vec![0, 1],
            shape(),
            None,
        );
        assert!(matches!(err, Err(FaceError::LengthMismatch { what: "labels", .. })));
    }

    #[test]
    fn test_wrong_image_size_rejected() {
        let err = FaceDataset::new(vec![vec![0.0; 47]], vec![vec![]], vec![0], shape(), None);
        assert!(matches!(err, Err(FaceError::LengthMismatch { what: "image", .. })));
    }

    #[test]
    fn test_augmented_fetch_stays_in_range() {
        let ds = dataset(4, Some(Augmentation::face_training()));
        for i in 0..4 {
            let s = ds.fetch(i).unwrap();
            assert_eq!(s.image.len(), 48);
            assert!(s.image.iter().all(|v| (0.0..=1.0).contains(v)));
            assert_eq!(s.label, i % 7);
        }
    }

    #[test]
    fn test_augmentation_needs_rgb_or_gray() {
        let shape = ImageShape::new(4, 2, 2);
        let err = FaceDataset::new(
            vec![vec![0.0; 16]],
            vec![vec![]],
            vec![0],
            shape,
            Some(Augmentation::face_training()),
        );
        assert!(matches!(err, Err(FaceError::InvalidConfig(_))));
    }
}
