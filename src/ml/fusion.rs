// ============================================================
// Layer 5 — Fusion Head
// ============================================================
// Backbone features, optionally joined with facial-landmark
// features, projected to emotion logits.
//
//   image ──► backbone ──► flatten ─┬─ use_landmarks ──► concat(landmarks)
//                                   │                       │
//                                   │                  Linear → BN
//                                   │                       │
//                                   │       (num_layers − 1) × [Linear → ReLU → Dropout (→ BN)]
//                                   │                       │
//                                   │                  out_lands ──► logits
//                                   │
//                                   └─ otherwise ──► out_no_lands ──► logits
//
// The width of the flattened backbone output is measured once
// at construction with a zero input of the configured shape.
//
// Class weights live outside the module (they are not trained)
// and are handed to the loss on every step.

use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::batcher::FaceBatch;
use crate::domain::{
    error::{FaceError, FaceResult},
    hyperparams::HyperParams,
    sample::ImageShape,
};
use crate::ml::backbone::Backbone;

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct FusionHeadConfig {
    pub num_classes:  usize,
    /// [channels, height, width] of one input image
    pub image_shape:  [usize; 3],
    pub landmark_len: usize,
    #[config(default = 512)]
    pub dense_units:  usize,
    #[config(default = 2)]
    pub num_layers:   usize,
    #[config(default = 0.2)]
    pub dropout_rate: f64,
    #[config(default = true)]
    pub layers_batch_norm: bool,
    #[config(default = true)]
    pub use_landmarks: bool,
}

impl FusionHeadConfig {
    /// Architecture section of a trial configuration.
    pub fn from_hyperparams(hp: &HyperParams, num_classes: usize, shape: ImageShape, landmark_len: usize) -> Self {
        Self::new(num_classes, shape.as_array(), landmark_len)
            .with_dense_units(hp.dense_units)
            .with_num_layers(hp.num_layers)
            .with_dropout_rate(hp.dropout_rate)
            .with_layers_batch_norm(hp.layers_batch_norm)
            .with_use_landmarks(hp.use_landmarks)
    }

    pub fn init<B: Backend>(&self, backbone: Backbone<B>, device: &B::Device) -> FaceResult<FusionHead<B>> {
        if self.num_layers == 0 {
            return Err(FaceError::InvalidConfig("num_layers must be at least 1".into()));
        }
        if self.dense_units == 0 {
            return Err(FaceError::InvalidConfig("dense_units must be positive".into()));
        }
        if self.num_classes == 0 {
            return Err(FaceError::InvalidConfig("num_classes must be positive".into()));
        }

        let [c, h, w] = self.image_shape;
        let base_output_size = backbone.output_width(ImageShape::new(c, h, w), device);
        tracing::debug!("Backbone output width: {}", base_output_size);

        let units = self.dense_units;
        let blocks = (1..self.num_layers)
            .map(|_| DenseBlock {
                linear:  LinearConfig::new(units, units).init(device),
                dropout: DropoutConfig::new(self.dropout_rate).init(),
                norm:    self.layers_batch_norm.then(|| BatchNormConfig::new(units).init(device)),
            })
            .collect();

        Ok(FusionHead {
            backbone,
            first:        LinearConfig::new(base_output_size + self.landmark_len, units).init(device),
            first_norm:   BatchNormConfig::new(units).init(device),
            blocks,
            out_lands:    LinearConfig::new(units, self.num_classes).init(device),
            out_no_lands: LinearConfig::new(base_output_size, self.num_classes).init(device),
            use_landmarks: self.use_landmarks,
            base_output_size,
        })
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────
/// Linear → ReLU → Dropout, optionally followed by batch norm.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub linear:  Linear<B>,
    pub dropout: Dropout,
    pub norm:    Option<BatchNorm<B, 0>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.dropout.forward(relu(self.linear.forward(x)));
        match &self.norm {
            Some(norm) => norm.forward(x),
            None       => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct FusionHead<B: Backend> {
    pub backbone:         Backbone<B>,
    pub first:            Linear<B>,
    pub first_norm:       BatchNorm<B, 0>,
    pub blocks:           Vec<DenseBlock<B>>,
    pub out_lands:        Linear<B>,
    pub out_no_lands:     Linear<B>,
    pub use_landmarks:    bool,
    pub base_output_size: usize,
}

/// Loss plus the counts needed for accuracy.
pub struct ClassificationStep<B: Backend> {
    pub loss:    Tensor<B, 1>,
    pub correct: usize,
    pub total:   usize,
}

impl<B: Backend> FusionHead<B> {
    /// images: [N, C, H, W], landmarks: [N, L] → logits [N, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>, landmarks: Tensor<B, 2>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images).flatten::<2>(1, 3);

        if !self.use_landmarks {
            return self.out_no_lands.forward(features);
        }

        let x = Tensor::cat(vec![features, landmarks], 1);
        let mut x = self.first_norm.forward(self.first.forward(x));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.out_lands.forward(x)
    }

    /// Weighted cross-entropy and argmax accuracy for one batch.
    pub fn forward_classification(&self, batch: FaceBatch<B>, weights: &ClassWeights) -> ClassificationStep<B> {
        let logits = self.forward(batch.images, batch.landmarks);
        let total = batch.labels.dims()[0];

        let loss = CrossEntropyLossConfig::new()
            .with_weights(Some(weights.as_slice().to_vec()))
            .init(&logits.device())
            .forward(logits.clone(), batch.labels.clone());

        // argmax(1) returns [N, 1]; flatten to [N] before comparing with labels
        let correct = logits
            .argmax(1)
            .flatten::<1>(0, 1)
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        ClassificationStep { loss, correct: correct as usize, total }
    }
}

// ─── ClassWeights ─────────────────────────────────────────────────────────────
/// Per-class multipliers for the cross-entropy loss.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassWeights(Vec<f32>);

impl ClassWeights {
    pub fn uniform(num_classes: usize) -> Self {
        Self(vec![1.0; num_classes])
    }

    pub fn new(weights: Vec<f32>, num_classes: usize) -> FaceResult<Self> {
        if weights.len() != num_classes {
            return Err(FaceError::InvalidConfig(format!(
                "expected {num_classes} class weights, got {}",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FaceError::InvalidConfig("class weights must be finite and non-negative".into()));
        }
        Ok(Self(weights))
    }

    /// `n_samples / (n_classes · count_c)`; classes absent from `labels` get weight 0.
    pub fn balanced(labels: &[usize], num_classes: usize) -> Self {
        let mut counts = vec![0usize; num_classes];
        for &label in labels {
            if label < num_classes {
                counts[label] += 1;
            }
        }
        let n = labels.len() as f32;
        Self(
            counts
                .into_iter()
                .map(|c| if c == 0 { 0.0 } else { n / (num_classes as f32 * c as f32) })
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::sample::ImageShape, ml::backbone::select_backbone};
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    const SHAPE: [usize; 3] = [3, 32, 32];

    fn head(use_landmarks: bool, num_layers: usize) -> FaceResult<FusionHead<TestBackend>> {
        let device = Default::default();
        let backbone = select_backbone::<TestBackend>("resnet18", ImageShape::new(3, 32, 32), None, &device)?;
        FusionHeadConfig::new(7, SHAPE, 4)
            .with_dense_units(16)
            .with_num_layers(num_layers)
            .with_use_landmarks(use_landmarks)
            .init(backbone, &device)
    }

    fn images(n: usize) -> Tensor<TestBackend, 4> {
        let [c, h, w] = SHAPE;
        Tensor::ones([n, c, h, w], &Default::default())
    }

    #[test]
    fn test_zero_pass_measures_backbone_width() {
        let model = head(true, 2).unwrap();
        assert_eq!(model.base_output_size, 512);
        assert_eq!(model.blocks.len(), 1);
    }

    #[test]
    fn test_landmark_path_output_shape() {
        let model = head(true, 3).unwrap();
        let lands = Tensor::<TestBackend, 2>::zeros([2, 4], &Default::default());
        assert_eq!(model.forward(images(2), lands).dims(), [2, 7]);
    }

    #[test]
    fn test_landmarks_are_ignored_when_disabled() {
        let model = head(false, 2).unwrap();
        let data = TensorData::new(vec![f32::NAN; 8], [2, 4]);
        let lands = Tensor::<TestBackend, 2>::from_data(data, &Default::default());
        let logits: Vec<f32> = model.forward(images(2), lands).into_data().to_vec().unwrap();
        assert_eq!(logits.len(), 14);
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_layers_is_invalid() {
        assert!(matches!(head(true, 0), Err(FaceError::InvalidConfig(_))));
    }

    #[test]
    fn test_classification_step() {
        let model = head(true, 2).unwrap();
        let device = Default::default();
        let batch = FaceBatch {
            images:    images(3),
            landmarks: Tensor::zeros([3, 4], &device),
            labels:    Tensor::from_ints([0, 3, 6], &device),
        };
        let step = model.forward_classification(batch, &ClassWeights::uniform(7));
        assert_eq!(step.total, 3);
        assert!(step.correct <= 3);
        let loss = step.loss.into_scalar().elem::<f64>();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_class_weights_length_checked() {
        assert!(ClassWeights::new(vec![1.0; 6], 7).is_err());
        assert!(ClassWeights::new(vec![1.0, -1.0], 2).is_err());
        assert!(ClassWeights::new(vec![2.0; 7], 7).is_ok());
    }

    #[test]
    fn test_balanced_weights() {
        let w = ClassWeights::balanced(&[0, 0, 0, 1], 3);
        let expected = [4.0 / 9.0, 4.0 / 3.0, 0.0];
        for (a, b) in w.as_slice().iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
