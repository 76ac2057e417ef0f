// ============================================================
// Plain convolutional stacks (VGG-16, AlexNet)
// ============================================================
// Stages of conv → relu layers, each stage closed by a max
// pool, followed by an adaptive average pool. The classifier
// MLP is never built, so the output is the pooled feature map:
//
//   vgg16:   [N, 512, 7, 7]
//   alexnet: [N, 256, 6, 6]

use burn::{
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::ConvSpec;

#[derive(Module, Debug)]
pub struct PlainNet<B: Backend> {
    pub stages:  Vec<Vec<Conv2d<B>>>,
    pub pool:    MaxPool2d,
    pub avgpool: AdaptiveAvgPool2d,
}

impl<B: Backend> PlainNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for stage in &self.stages {
            for conv in stage {
                x = relu(conv.forward(x));
            }
            x = self.pool.forward(x);
        }
        self.avgpool.forward(x)
    }
}

/// VGG-16 (configuration "D", no batch norm).
pub fn vgg16<B: Backend>(device: &B::Device) -> PlainNet<B> {
    let widths: [&[usize]; 5] = [&[64, 64], &[128, 128], &[256, 256, 256], &[512, 512, 512], &[512, 512, 512]];

    let mut in_channels = 3;
    let mut stages: Vec<Vec<Conv2d<B>>> = Vec::with_capacity(widths.len());
    for stage in widths {
        let mut convs = Vec::with_capacity(stage.len());
        for &out in stage {
            convs.push(ConvSpec::new(in_channels, out, 3).bias(true).conv(device));
            in_channels = out;
        }
        stages.push(convs);
    }

    PlainNet {
        stages,
        pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        avgpool: AdaptiveAvgPool2dConfig::new([7, 7]).init(),
    }
}

/// AlexNet feature extractor.
pub fn alexnet<B: Backend>(device: &B::Device) -> PlainNet<B> {
    let stages = vec![
        vec![ConvSpec::new(3, 64, 11).stride(4).padding(2).bias(true).conv(device)],
        vec![ConvSpec::new(64, 192, 5).bias(true).conv(device)],
        vec![
            ConvSpec::new(192, 384, 3).bias(true).conv(device),
            ConvSpec::new(384, 256, 3).bias(true).conv(device),
            ConvSpec::new(256, 256, 3).bias(true).conv(device),
        ],
    ];

    PlainNet {
        stages,
        pool:    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        avgpool: AdaptiveAvgPool2dConfig::new([6, 6]).init(),
    }
}
