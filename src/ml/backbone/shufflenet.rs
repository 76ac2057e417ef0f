// ============================================================
// ShuffleNetV2 x1.0
// ============================================================
// conv3×3/2 (24) → maxpool → stages of 4 / 8 / 4 shuffle units
// (116 / 232 / 464 channels) → conv1×1 (1024).
// Output: [N, 1024, H/32, W/32].
//
// Stride-1 units split channels in half, transform one half
// and concatenate; stride-2 units run both branches on the
// full input. Each unit ends with a 2-group channel shuffle.

use burn::{
    nn::{
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::blocks::{ConvBn, ConvSpec};

const STAGE_REPEATS: [usize; 3] = [4, 8, 4];
const STAGE_CHANNELS: [usize; 5] = [24, 116, 232, 464, 1024];

#[derive(Module, Debug)]
pub struct ShuffleUnit<B: Backend> {
    /// Present only on stride-2 units: depthwise → 1×1 → relu
    pub branch1: Option<Vec<ConvBn<B>>>,
    /// 1×1 → relu → depthwise → 1×1 → relu
    pub branch2: Vec<ConvBn<B>>,
}

impl<B: Backend> ShuffleUnit<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let half = out_channels / 2;
        let branch1 = (stride > 1).then(|| {
            vec![
                ConvSpec::new(in_channels, in_channels, 3).stride(stride).depthwise().conv_bn(device),
                ConvSpec::new(in_channels, half, 1).conv_bn(device),
            ]
        });
        let branch2_in = if stride > 1 { in_channels } else { half };
        let branch2 = vec![
            ConvSpec::new(branch2_in, half, 1).conv_bn(device),
            ConvSpec::new(half, half, 3).stride(stride).depthwise().conv_bn(device),
            ConvSpec::new(half, half, 1).conv_bn(device),
        ];
        Self { branch1, branch2 }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = match &self.branch1 {
            Some(branch1) => {
                let left = relu(branch1[1].forward(branch1[0].forward(x.clone())));
                Tensor::cat(vec![left, Self::branch2(&self.branch2, x)], 1)
            }
            None => {
                let [n, c, h, w] = x.dims();
                let left = x.clone().slice([0..n, 0..c / 2, 0..h, 0..w]);
                let right = x.slice([0..n, c / 2..c, 0..h, 0..w]);
                Tensor::cat(vec![left, Self::branch2(&self.branch2, right)], 1)
            }
        };
        channel_shuffle(out, 2)
    }

    fn branch2(convs: &[ConvBn<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(convs[0].forward(x));
        let x = convs[1].forward(x);
        relu(convs[2].forward(x))
    }
}

/// Interleave channels across `groups`.
pub fn channel_shuffle<B: Backend>(x: Tensor<B, 4>, groups: usize) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();
    x.reshape([n, groups, c / groups, h, w])
        .swap_dims(1, 2)
        .reshape([n, c, h, w])
}

#[derive(Module, Debug)]
pub struct ShuffleNet<B: Backend> {
    pub conv1:   ConvBn<B>,
    pub maxpool: MaxPool2d,
    pub units:   Vec<ShuffleUnit<B>>,
    pub conv5:   ConvBn<B>,
}

impl<B: Backend> ShuffleNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.maxpool.forward(relu(self.conv1.forward(x)));
        for unit in &self.units {
            x = unit.forward(x);
        }
        relu(self.conv5.forward(x))
    }
}

pub fn shufflenet_v2_x1_0<B: Backend>(device: &B::Device) -> ShuffleNet<B> {
    let mut units = Vec::new();
    let mut in_channels = STAGE_CHANNELS[0];
    for (stage, &repeats) in STAGE_REPEATS.iter().enumerate() {
        let out_channels = STAGE_CHANNELS[stage + 1];
        units.push(ShuffleUnit::new(in_channels, out_channels, 2, device));
        for _ in 1..repeats {
            units.push(ShuffleUnit::new(out_channels, out_channels, 1, device));
        }
        in_channels = out_channels;
    }

    ShuffleNet {
        conv1: ConvSpec::new(3, STAGE_CHANNELS[0], 3).stride(2).conv_bn(device),
        maxpool: MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(),
        units,
        conv5: ConvSpec::new(in_channels, STAGE_CHANNELS[4], 1).conv_bn(device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    #[test]
    fn test_channel_shuffle_interleaves() {
        let device = Default::default();
        // channels 0..4 each filled with its index
        let data: Vec<f32> = (0..4).map(|c| c as f32).collect();
        let x = Tensor::<NdArray, 4>::from_data(TensorData::new(data, [1, 4, 1, 1]), &device);
        let out: Vec<f32> = channel_shuffle(x, 2).into_data().to_vec().unwrap();
        assert_eq!(out, vec![0.0, 2.0, 1.0, 3.0]);
    }
}
