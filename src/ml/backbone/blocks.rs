// Shared convolution building blocks for the backbone families.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Geometry of one 2-D convolution (square kernel, symmetric padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSpec {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub kernel:       usize,
    pub stride:       usize,
    pub padding:      usize,
    pub groups:       usize,
    pub bias:         bool,
}

impl ConvSpec {
    /// Stride 1, "same" padding, no grouping, no bias.
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize) -> Self {
        Self { in_channels, out_channels, kernel, stride: 1, padding: kernel / 2, groups: 1, bias: false }
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    /// Depthwise: one group per input channel.
    pub fn depthwise(self) -> Self {
        let groups = self.in_channels;
        self.groups(groups)
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn conv<B: Backend>(&self, device: &B::Device) -> Conv2d<B> {
        Conv2dConfig::new([self.in_channels, self.out_channels], [self.kernel, self.kernel])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_groups(self.groups)
            .with_bias(self.bias)
            .init(device)
    }

    pub fn conv_bn<B: Backend>(&self, device: &B::Device) -> ConvBn<B> {
        self.conv_bn_eps(1e-5, device)
    }

    pub fn conv_bn_eps<B: Backend>(&self, epsilon: f64, device: &B::Device) -> ConvBn<B> {
        ConvBn {
            conv: self.conv(device),
            bn:   BatchNormConfig::new(self.out_channels).with_epsilon(epsilon).init(device),
        }
    }
}

/// Convolution followed by batch norm; activation is left to the caller.
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }

    pub fn forward_act(&self, x: Tensor<B, 4>, act: Act) -> Tensor<B, 4> {
        act.apply(self.forward(x))
    }
}

/// Non-linearity selector for blocks shared between families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    Relu,
    Relu6,
}

impl Act {
    pub fn apply<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Act::Relu  => relu(x),
            Act::Relu6 => x.clamp(0.0, 6.0),
        }
    }
}
