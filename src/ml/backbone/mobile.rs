// ============================================================
// Inverted-residual networks (MobileNetV2, MNASNet 1.0)
// ============================================================
// Both are stacks of inverted residual blocks:
//
//   [1×1 expand → act] → k×k depthwise → act → 1×1 project
//   (+ identity when stride is 1 and channels match)
//
// and end with a 1×1 conv to 1280 channels. Only the feature
// stack is built. Output: [N, 1280, H/32, W/32].
//
// MobileNetV2 uses ReLU6 and always-3×3 depthwise kernels;
// MNASNet uses ReLU and 3×3 / 5×5 kernels.

use burn::prelude::*;

use super::blocks::{Act, ConvBn, ConvSpec};

const LAST_CHANNELS: usize = 1280;

#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    pub expand:    Option<ConvBn<B>>,
    pub depthwise: ConvBn<B>,
    pub project:   ConvBn<B>,
    pub residual:  bool,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(
        in_channels:  usize,
        out_channels: usize,
        kernel:       usize,
        stride:       usize,
        expand_ratio: usize,
        device:       &B::Device,
    ) -> Self {
        let hidden = in_channels * expand_ratio;
        Self {
            expand: (expand_ratio != 1).then(|| ConvSpec::new(in_channels, hidden, 1).conv_bn(device)),
            depthwise: ConvSpec::new(hidden, hidden, kernel).stride(stride).depthwise().conv_bn(device),
            project: ConvSpec::new(hidden, out_channels, 1).conv_bn(device),
            residual: stride == 1 && in_channels == out_channels,
        }
    }

    fn forward(&self, x: Tensor<B, 4>, act: Act) -> Tensor<B, 4> {
        let mut out = x.clone();
        if let Some(expand) = &self.expand {
            out = expand.forward_act(out, act);
        }
        let out = self.project.forward(self.depthwise.forward_act(out, act));
        if self.residual { out + x } else { out }
    }
}

/// Stem convs, inverted-residual blocks and the 1280-channel head.
#[derive(Module, Debug)]
pub struct MobileNet<B: Backend> {
    pub stem:   Vec<ConvBn<B>>,
    pub blocks: Vec<InvertedResidual<B>>,
    pub head:   ConvBn<B>,
}

impl<B: Backend> MobileNet<B> {
    /// MNASNet's last stem conv is linear (no activation).
    fn forward_with(&self, x: Tensor<B, 4>, act: Act, linear_stem_tail: bool) -> Tensor<B, 4> {
        let mut x = x;
        let last = self.stem.len() - 1;
        for (i, conv) in self.stem.iter().enumerate() {
            x = if linear_stem_tail && i == last { conv.forward(x) } else { conv.forward_act(x, act) };
        }
        for block in &self.blocks {
            x = block.forward(x, act);
        }
        self.head.forward_act(x, act)
    }

    pub fn forward_v2(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with(x, Act::Relu6, false)
    }

    pub fn forward_mnas(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with(x, Act::Relu, true)
    }
}

/// Inverted-residual stage: (expansion t, channels c, repeats n, stride s, kernel k).
struct Stage {
    t: usize,
    c: usize,
    n: usize,
    s: usize,
    k: usize,
}

const fn stage(t: usize, c: usize, n: usize, s: usize, k: usize) -> Stage {
    Stage { t, c, n, s, k }
}

fn build_blocks<B: Backend>(mut in_channels: usize, stages: &[Stage], device: &B::Device) -> (Vec<InvertedResidual<B>>, usize) {
    let mut blocks = Vec::new();
    for st in stages {
        for i in 0..st.n {
            let stride = if i == 0 { st.s } else { 1 };
            blocks.push(InvertedResidual::new(in_channels, st.c, st.k, stride, st.t, device));
            in_channels = st.c;
        }
    }
    (blocks, in_channels)
}

pub fn mobilenet_v2<B: Backend>(device: &B::Device) -> MobileNet<B> {
    let stages = [
        stage(1, 16, 1, 1, 3),
        stage(6, 24, 2, 2, 3),
        stage(6, 32, 3, 2, 3),
        stage(6, 64, 4, 2, 3),
        stage(6, 96, 3, 1, 3),
        stage(6, 160, 3, 2, 3),
        stage(6, 320, 1, 1, 3),
    ];
    let (blocks, last) = build_blocks(32, &stages, device);

    MobileNet {
        stem: vec![ConvSpec::new(3, 32, 3).stride(2).conv_bn(device)],
        blocks,
        head: ConvSpec::new(last, LAST_CHANNELS, 1).conv_bn(device),
    }
}

pub fn mnasnet1_0<B: Backend>(device: &B::Device) -> MobileNet<B> {
    let stages = [
        stage(3, 24, 3, 2, 3),
        stage(3, 40, 3, 2, 5),
        stage(6, 80, 3, 2, 5),
        stage(6, 96, 2, 1, 3),
        stage(6, 192, 4, 2, 5),
        stage(6, 320, 1, 1, 3),
    ];
    let (blocks, last) = build_blocks(16, &stages, device);

    MobileNet {
        stem: vec![
            ConvSpec::new(3, 32, 3).stride(2).conv_bn(device),
            ConvSpec::new(32, 32, 3).depthwise().conv_bn(device),
            ConvSpec::new(32, 16, 1).conv_bn(device),
        ],
        blocks,
        head: ConvSpec::new(last, LAST_CHANNELS, 1).conv_bn(device),
    }
}
