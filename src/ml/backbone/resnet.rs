// ============================================================
// ResNet family (ResNet, ResNeXt, Wide ResNet)
// ============================================================
// One parameterised implementation covers all nine variants:
//
//   stem:   conv7x7/2 → bn → relu → maxpool3x3/2
//   layer1..layer4: residual blocks, planes 64/128/256/512,
//                   stride 1/2/2/2
//   pool:   adaptive average pool to 1×1
//
// Output: [N, 512·expansion, 1, 1]. The final fc is never built.
//
// Basic blocks (expansion 1) stack two 3×3 convs. Bottleneck
// blocks (expansion 4) stack 1×1 → 3×3 (grouped) → 1×1, with
// inner width = planes · (width_per_group / 64) · groups.

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::{ConvBn, ConvSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Basic,
    Bottleneck,
}

impl BlockKind {
    pub fn expansion(self) -> usize {
        match self {
            BlockKind::Basic      => 1,
            BlockKind::Bottleneck => 4,
        }
    }
}

/// Architecture of one ResNet-family variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResNetSpec {
    pub block:           BlockKind,
    pub layers:          [usize; 4],
    pub groups:          usize,
    pub width_per_group: usize,
}

impl ResNetSpec {
    pub const fn new(block: BlockKind, layers: [usize; 4]) -> Self {
        Self { block, layers, groups: 1, width_per_group: 64 }
    }

    pub const fn grouped(mut self, groups: usize, width_per_group: usize) -> Self {
        self.groups = groups;
        self.width_per_group = width_per_group;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let stem = ConvSpec::new(3, 64, 7).stride(2).padding(3).conv_bn(device);

        let mut blocks = Vec::new();
        let mut in_channels = 64;
        for (stage, &count) in self.layers.iter().enumerate() {
            let planes = 64 << stage;
            let stride = if stage == 0 { 1 } else { 2 };
            for i in 0..count {
                let s = if i == 0 { stride } else { 1 };
                let block = self.block_init(in_channels, planes, s, device);
                in_channels = planes * self.block.expansion();
                blocks.push(block);
            }
        }

        ResNet {
            stem,
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    fn block_init<B: Backend>(
        &self,
        in_channels: usize,
        planes:      usize,
        stride:      usize,
        device:      &B::Device,
    ) -> ResidualBlock<B> {
        let out_channels = planes * self.block.expansion();
        let convs = match self.block {
            BlockKind::Basic => vec![
                ConvSpec::new(in_channels, planes, 3).stride(stride).conv_bn(device),
                ConvSpec::new(planes, planes, 3).conv_bn(device),
            ],
            BlockKind::Bottleneck => {
                let width = planes * self.width_per_group / 64 * self.groups;
                vec![
                    ConvSpec::new(in_channels, width, 1).conv_bn(device),
                    ConvSpec::new(width, width, 3).stride(stride).groups(self.groups).conv_bn(device),
                    ConvSpec::new(width, out_channels, 1).conv_bn(device),
                ]
            }
        };
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| ConvSpec::new(in_channels, out_channels, 1).stride(stride).conv_bn(device));

        ResidualBlock { convs, downsample }
    }
}

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub convs:      Vec<ConvBn<B>>,
    pub downsample: Option<ConvBn<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };
        let last = self.convs.len() - 1;
        let mut out = x;
        for (i, conv) in self.convs.iter().enumerate() {
            out = conv.forward(out);
            if i < last {
                out = relu(out);
            }
        }
        relu(out + identity)
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub stem:    ConvBn<B>,
    pub maxpool: MaxPool2d,
    pub blocks:  Vec<ResidualBlock<B>>,
    pub avgpool: AdaptiveAvgPool2d,
}

impl<B: Backend> ResNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.maxpool.forward(relu(self.stem.forward(x)));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.avgpool.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_pooled_channels_follow_block_expansion() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 32, 32], &device);
        let basic = ResNetSpec::new(BlockKind::Basic, [1, 1, 1, 1]).init::<NdArray>(&device);
        assert_eq!(basic.forward(x.clone()).dims(), [1, 512, 1, 1]);

        let bottleneck = ResNetSpec::new(BlockKind::Bottleneck, [1, 1, 1, 1]).init::<NdArray>(&device);
        assert_eq!(bottleneck.forward(x).dims(), [1, 512 * BlockKind::Bottleneck.expansion(), 1, 1]);
    }
}
