// ============================================================
// DenseNet-121 feature stack
// ============================================================
// stem → 4 dense blocks (6, 12, 24, 16 layers, growth 32)
// with transitions halving channels and resolution between
// them → final batch norm. Output: [N, 1024, H/32, W/32].
//
// Dense layers are pre-activation (bn → relu → conv) and each
// appends `growth` channels to the running feature map.

use burn::{
    nn::{
        conv::Conv2d,
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::{ConvBn, ConvSpec};

const GROWTH: usize = 32;
const BN_SIZE: usize = 4;
const BLOCKS: [usize; 4] = [6, 12, 24, 16];
const STEM_FEATURES: usize = 64;

#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    pub norm1: BatchNorm<B, 2>,
    pub conv1: Conv2d<B>,
    pub norm2: BatchNorm<B, 2>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    fn new(in_channels: usize, device: &B::Device) -> Self {
        let inner = BN_SIZE * GROWTH;
        Self {
            norm1: BatchNormConfig::new(in_channels).init(device),
            conv1: ConvSpec::new(in_channels, inner, 1).conv(device),
            norm2: BatchNormConfig::new(inner).init(device),
            conv2: ConvSpec::new(inner, GROWTH, 3).conv(device),
        }
    }

    /// Returns only the new `GROWTH` channels.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(relu(self.norm1.forward(x)));
        self.conv2.forward(relu(self.norm2.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    pub norm: BatchNorm<B, 2>,
    pub conv: Conv2d<B>,
    pub pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.conv.forward(relu(self.norm.forward(x))))
    }
}

#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    pub stem:        ConvBn<B>,
    pub pool0:       MaxPool2d,
    pub blocks:      Vec<Vec<DenseLayer<B>>>,
    pub transitions: Vec<Transition<B>>,
    pub norm5:       BatchNorm<B, 2>,
}

impl<B: Backend> DenseNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.pool0.forward(relu(self.stem.forward(x)));
        for (i, block) in self.blocks.iter().enumerate() {
            for layer in block {
                let new = layer.forward(x.clone());
                x = Tensor::cat(vec![x, new], 1);
            }
            if let Some(transition) = self.transitions.get(i) {
                x = transition.forward(x);
            }
        }
        self.norm5.forward(x)
    }
}

pub fn densenet121<B: Backend>(device: &B::Device) -> DenseNet<B> {
    let mut features = STEM_FEATURES;
    let mut blocks = Vec::new();
    let mut transitions = Vec::new();

    for (i, &layers) in BLOCKS.iter().enumerate() {
        let block = (0..layers)
            .map(|j| DenseLayer::new(features + j * GROWTH, device))
            .collect::<Vec<_>>();
        blocks.push(block);
        features += layers * GROWTH;

        if i + 1 < BLOCKS.len() {
            transitions.push(Transition {
                norm: BatchNormConfig::new(features).init(device),
                conv: ConvSpec::new(features, features / 2, 1).conv(device),
                pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            });
            features /= 2;
        }
    }

    DenseNet {
        stem: ConvSpec::new(3, STEM_FEATURES, 7).stride(2).padding(3).conv_bn(device),
        pool0: MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(),
        blocks,
        transitions,
        norm5: BatchNormConfig::new(features).init(device),
    }
}
