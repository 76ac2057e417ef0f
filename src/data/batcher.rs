// ============================================================
// Layer 4 — Face Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<FaceSample>
// into device tensors:
//
//   images    [N, C, H, W]  f32
//   landmarks [N, L]        f32
//   labels    [N]           int
//
// Every sample already has the same image shape and landmark
// length (checked by FaceDataset), so stacking is a flat copy
// followed by a reshape.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::sample::{FaceSample, ImageShape};

#[derive(Debug, Clone)]
pub struct FaceBatch<B: Backend> {
    pub images:    Tensor<B, 4>,
    pub landmarks: Tensor<B, 2>,
    pub labels:    Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct FaceBatcher<B: Backend> {
    pub device: B::Device,
    pub shape:  ImageShape,
}

impl<B: Backend> FaceBatcher<B> {
    pub fn new(device: B::Device, shape: ImageShape) -> Self {
        Self { device, shape }
    }
}

impl<B: Backend> Batcher<FaceSample, FaceBatch<B>> for FaceBatcher<B> {
    fn batch(&self, items: Vec<FaceSample>) -> FaceBatch<B> {
        let n = items.len();
        let [c, h, w] = self.shape.as_array();
        let landmark_len = items.first().map_or(0, |s| s.landmarks.len());

        let image_flat: Vec<f32> = items.iter().flat_map(|s| s.image.iter().copied()).collect();
        let land_flat:  Vec<f32> = items.iter().flat_map(|s| s.landmarks.iter().copied()).collect();
        let labels:     Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let images = Tensor::<B, 4>::from_data(TensorData::new(image_flat, [n, c, h, w]), &self.device);
        let landmarks = Tensor::<B, 2>::from_data(TensorData::new(land_flat, [n, landmark_len]), &self.device);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        FaceBatch { images, landmarks, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let shape = ImageShape::new(3, 2, 2);
        let items = (0..4)
            .map(|i| FaceSample { image: vec![0.5; 12], landmarks: vec![i as f32; 5], label: i })
            .collect();
        let batcher = FaceBatcher::<NdArray>::new(Default::default(), shape);
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [4, 3, 2, 2]);
        assert_eq!(batch.landmarks.dims(), [4, 5]);
        assert_eq!(batch.labels.dims(), [4]);

        let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }
}
