// ============================================================
// SqueezeNet 1.0 feature stack
// ============================================================
// conv7×7/2 → relu → maxpool → 3 fire → maxpool → 4 fire →
// maxpool → 1 fire. Output: [N, 512, h, w].
//
// Fire module: 1×1 squeeze → relu, then concat of 1×1 and 3×3
// expand branches (each relu).

use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::ConvSpec;

#[derive(Module, Debug)]
pub struct Fire<B: Backend> {
    pub squeeze:   Conv2d<B>,
    pub expand1x1: Conv2d<B>,
    pub expand3x3: Conv2d<B>,
}

impl<B: Backend> Fire<B> {
    fn new(in_channels: usize, squeeze: usize, e1: usize, e3: usize, device: &B::Device) -> Self {
        Self {
            squeeze:   ConvSpec::new(in_channels, squeeze, 1).bias(true).conv(device),
            expand1x1: ConvSpec::new(squeeze, e1, 1).bias(true).conv(device),
            expand3x3: ConvSpec::new(squeeze, e3, 3).bias(true).conv(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let s = relu(self.squeeze.forward(x));
        Tensor::cat(
            vec![relu(self.expand1x1.forward(s.clone())), relu(self.expand3x3.forward(s))],
            1,
        )
    }
}

#[derive(Module, Debug)]
pub struct SqueezeNet<B: Backend> {
    pub stem:   Conv2d<B>,
    pub pool:   MaxPool2d,
    pub stages: Vec<Vec<Fire<B>>>,
}

impl<B: Backend> SqueezeNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = relu(self.stem.forward(x));
        for stage in &self.stages {
            x = self.pool.forward(x);
            for fire in stage {
                x = fire.forward(x);
            }
        }
        x
    }
}

pub fn squeezenet1_0<B: Backend>(device: &B::Device) -> SqueezeNet<B> {
    let fire = |i, s, e| Fire::<B>::new(i, s, e, e, device);
    SqueezeNet {
        stem: ConvSpec::new(3, 96, 7).stride(2).padding(0).bias(true).conv(device),
        pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        stages: vec![
            vec![fire(96, 16, 64), fire(128, 16, 64), fire(128, 32, 128)],
            vec![fire(256, 32, 128), fire(256, 48, 192), fire(384, 48, 192), fire(384, 64, 256)],
            vec![fire(512, 64, 256)],
        ],
    }
}
