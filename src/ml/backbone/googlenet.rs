// ============================================================
// GoogLeNet (Inception v1) without auxiliary heads
// ============================================================
// stem convs → inception 3a..3b → pool → 4a..4e → pool →
// 5a..5b → global average pool. Output: [N, 1024, 1, 1].
//
// Every conv is conv → bn(eps 1e-3) → relu. Each inception
// module concatenates four branches:
//   1×1 | 1×1 → 3×3 | 1×1 → 3×3 | maxpool3×3/1 → 1×1

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::{ConvBn, ConvSpec};

const BN_EPS: f64 = 1e-3;

fn basic_conv<B: Backend>(spec: ConvSpec, device: &B::Device) -> ConvBn<B> {
    spec.conv_bn_eps(BN_EPS, device)
}

fn run<B: Backend>(convs: &[ConvBn<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
    convs.iter().fold(x, |x, conv| relu(conv.forward(x)))
}

#[derive(Module, Debug)]
pub struct Inception<B: Backend> {
    pub branch1: Vec<ConvBn<B>>,
    pub branch2: Vec<ConvBn<B>>,
    pub branch3: Vec<ConvBn<B>>,
    pub pool:    MaxPool2d,
    pub branch4: Vec<ConvBn<B>>,
}

impl<B: Backend> Inception<B> {
    /// Channel arguments follow the usual (in, 1×1, 3×3 reduce, 3×3, 5×5 reduce, 5×5, pool proj) order.
    #[allow(clippy::too_many_arguments)]
    fn new(
        in_channels: usize,
        ch1x1:       usize,
        ch3x3red:    usize,
        ch3x3:       usize,
        ch5x5red:    usize,
        ch5x5:       usize,
        pool_proj:   usize,
        device:      &B::Device,
    ) -> Self {
        Self {
            branch1: vec![basic_conv(ConvSpec::new(in_channels, ch1x1, 1), device)],
            branch2: vec![
                basic_conv(ConvSpec::new(in_channels, ch3x3red, 1), device),
                basic_conv(ConvSpec::new(ch3x3red, ch3x3, 3), device),
            ],
            branch3: vec![
                basic_conv(ConvSpec::new(in_channels, ch5x5red, 1), device),
                basic_conv(ConvSpec::new(ch5x5red, ch5x5, 3), device),
            ],
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            branch4: vec![basic_conv(ConvSpec::new(in_channels, pool_proj, 1), device)],
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = run(&self.branch1, x.clone());
        let b2 = run(&self.branch2, x.clone());
        let b3 = run(&self.branch3, x.clone());
        let b4 = run(&self.branch4, self.pool.forward(x));
        Tensor::cat(vec![b1, b2, b3, b4], 1)
    }
}

#[derive(Module, Debug)]
pub struct GoogLeNet<B: Backend> {
    pub stem:    Vec<ConvBn<B>>,
    pub pool3:   MaxPool2d,
    pub pool2:   MaxPool2d,
    /// Inception modules grouped by resolution (3x, 4x, 5x)
    pub stages:  Vec<Vec<Inception<B>>>,
    pub avgpool: AdaptiveAvgPool2d,
}

impl<B: Backend> GoogLeNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        // conv1 → pool → conv2 → conv3 → pool
        let x = relu(self.stem[0].forward(x));
        let x = self.pool3.forward(x);
        let x = run(&self.stem[1..], x);
        let mut x = self.pool3.forward(x);

        for (i, stage) in self.stages.iter().enumerate() {
            for module in stage {
                x = module.forward(x);
            }
            x = match i {
                0 => self.pool3.forward(x),
                1 => self.pool2.forward(x),
                _ => x,
            };
        }
        self.avgpool.forward(x)
    }
}

pub fn googlenet<B: Backend>(device: &B::Device) -> GoogLeNet<B> {
    let inc = |a, b, c, d, e, f, g| Inception::<B>::new(a, b, c, d, e, f, g, device);
    GoogLeNet {
        stem: vec![
            basic_conv(ConvSpec::new(3, 64, 7).stride(2).padding(3), device),
            basic_conv(ConvSpec::new(64, 64, 1), device),
            basic_conv(ConvSpec::new(64, 192, 3), device),
        ],
        pool3: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        stages: vec![
            vec![
                inc(192, 64, 96, 128, 16, 32, 32),
                inc(256, 128, 128, 192, 32, 96, 64),
            ],
            vec![
                inc(480, 192, 96, 208, 16, 48, 64),
                inc(512, 160, 112, 224, 24, 64, 64),
                inc(512, 128, 128, 256, 24, 64, 64),
                inc(512, 112, 144, 288, 32, 64, 64),
                inc(528, 256, 160, 320, 32, 128, 128),
            ],
            vec![
                inc(832, 256, 160, 320, 32, 128, 128),
                inc(832, 384, 192, 384, 48, 128, 128),
            ],
        ],
        avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
    }
}
