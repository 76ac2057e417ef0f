// ============================================================
// Layer 5 — Backbone Selector
// ============================================================
// Maps a backbone name to a convolutional feature extractor
// with its classification head removed.
//
//   name ──parse──► BackboneKind ──build──► Backbone<B>
//
// BackboneKind is a closed enum; `build` is the lookup table
// from variant to factory. Unknown names fail at parse time,
// "inception" parses but fails at build time.
//
// Pretrained weights are burn records stored as
// <weights_dir>/<name>.mpk (CompactRecorder format).

use burn::{prelude::*, record::CompactRecorder};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

use crate::domain::{
    error::{FaceError, FaceResult},
    sample::ImageShape,
};
use crate::infra::checkpoint::record_file;

pub mod blocks;
pub mod densenet;
pub mod googlenet;
pub mod mobile;
pub mod plain;
pub mod resnet;
pub mod shufflenet;
pub mod squeezenet;

use resnet::{BlockKind, ResNetSpec};

// ─── BackboneKind ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackboneKind {
    ResNet18,
    ResNet34,
    ResNet50,
    ResNet101,
    ResNet152,
    ResNeXt50,
    ResNeXt101,
    WideResNet50,
    WideResNet101,
    Inception,
    GoogLeNet,
    MobileNet,
    DenseNet,
    AlexNet,
    Vgg16,
    SqueezeNet,
    ShuffleNet,
    MnasNet,
}

impl BackboneKind {
    pub const ALL: [BackboneKind; 18] = [
        BackboneKind::ResNet18,
        BackboneKind::ResNet34,
        BackboneKind::ResNet50,
        BackboneKind::ResNet101,
        BackboneKind::ResNet152,
        BackboneKind::ResNeXt50,
        BackboneKind::ResNeXt101,
        BackboneKind::WideResNet50,
        BackboneKind::WideResNet101,
        BackboneKind::Inception,
        BackboneKind::GoogLeNet,
        BackboneKind::MobileNet,
        BackboneKind::DenseNet,
        BackboneKind::AlexNet,
        BackboneKind::Vgg16,
        BackboneKind::SqueezeNet,
        BackboneKind::ShuffleNet,
        BackboneKind::MnasNet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackboneKind::ResNet18      => "resnet18",
            BackboneKind::ResNet34      => "resnet34",
            BackboneKind::ResNet50      => "resnet50",
            BackboneKind::ResNet101     => "resnet101",
            BackboneKind::ResNet152     => "resnet152",
            BackboneKind::ResNeXt50     => "resnext50_32x4d",
            BackboneKind::ResNeXt101    => "resnext101_32x8d",
            BackboneKind::WideResNet50  => "wide_resnet50_2",
            BackboneKind::WideResNet101 => "wide_resnet101_2",
            BackboneKind::Inception     => "inception",
            BackboneKind::GoogLeNet     => "googlenet",
            BackboneKind::MobileNet     => "mobilenet",
            BackboneKind::DenseNet      => "densenet",
            BackboneKind::AlexNet       => "alexnet",
            BackboneKind::Vgg16         => "vgg16",
            BackboneKind::SqueezeNet    => "squeezenet",
            BackboneKind::ShuffleNet    => "shufflenet",
            BackboneKind::MnasNet       => "mnasnet",
        }
    }

    /// Architecture of the ResNet-family variants.
    pub fn resnet_spec(self) -> Option<ResNetSpec> {
        use BlockKind::{Basic, Bottleneck};
        let spec = match self {
            BackboneKind::ResNet18      => ResNetSpec::new(Basic, [2, 2, 2, 2]),
            BackboneKind::ResNet34      => ResNetSpec::new(Basic, [3, 4, 6, 3]),
            BackboneKind::ResNet50      => ResNetSpec::new(Bottleneck, [3, 4, 6, 3]),
            BackboneKind::ResNet101     => ResNetSpec::new(Bottleneck, [3, 4, 23, 3]),
            BackboneKind::ResNet152     => ResNetSpec::new(Bottleneck, [3, 8, 36, 3]),
            BackboneKind::ResNeXt50     => ResNetSpec::new(Bottleneck, [3, 4, 6, 3]).grouped(32, 4),
            BackboneKind::ResNeXt101    => ResNetSpec::new(Bottleneck, [3, 4, 23, 3]).grouped(32, 8),
            BackboneKind::WideResNet50  => ResNetSpec::new(Bottleneck, [3, 4, 6, 3]).grouped(1, 128),
            BackboneKind::WideResNet101 => ResNetSpec::new(Bottleneck, [3, 4, 23, 3]).grouped(1, 128),
            _ => return None,
        };
        Some(spec)
    }

    /// Smallest square input whose feature map survives every pooling stage.
    pub fn min_input_size(self) -> usize {
        match self {
            BackboneKind::AlexNet | BackboneKind::SqueezeNet | BackboneKind::GoogLeNet => 64,
            _ => 32,
        }
    }

    /// Instantiate the feature extractor. `weights_dir = None` means random init.
    pub fn build<B: Backend>(self, weights_dir: Option<&Path>, device: &B::Device) -> FaceResult<Backbone<B>> {
        if let Some(spec) = self.resnet_spec() {
            return Backbone::ResNet(spec.init(device)).with_weights(self, weights_dir, device);
        }

        let backbone = match self {
            BackboneKind::Inception  => return Err(FaceError::UnsupportedBackbone(self.name().to_string())),
            BackboneKind::GoogLeNet  => Backbone::GoogLeNet(googlenet::googlenet(device)),
            BackboneKind::MobileNet  => Backbone::MobileNetV2(mobile::mobilenet_v2(device)),
            BackboneKind::DenseNet   => Backbone::DenseNet(densenet::densenet121(device)),
            BackboneKind::AlexNet    => Backbone::Plain(plain::alexnet(device)),
            BackboneKind::Vgg16      => Backbone::Plain(plain::vgg16(device)),
            BackboneKind::SqueezeNet => Backbone::SqueezeNet(squeezenet::squeezenet1_0(device)),
            BackboneKind::ShuffleNet => Backbone::ShuffleNet(shufflenet::shufflenet_v2_x1_0(device)),
            BackboneKind::MnasNet    => Backbone::MnasNet(mobile::mnasnet1_0(device)),
            resnet => unreachable!("{} handled by resnet_spec", resnet.name()),
        };
        backbone.with_weights(self, weights_dir, device)
    }
}

impl fmt::Display for BackboneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackboneKind {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| FaceError::UnknownBackbone(s.to_string()))
    }
}

impl TryFrom<String> for BackboneKind {
    type Error = FaceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BackboneKind> for String {
    fn from(kind: BackboneKind) -> Self {
        kind.name().to_string()
    }
}

/// Parse `name`, check that images of `shape` fit it, and build the
/// matching extractor.
pub fn select_backbone<B: Backend>(
    name:        &str,
    shape:       ImageShape,
    weights_dir: Option<&Path>,
    device:      &B::Device,
) -> FaceResult<Backbone<B>> {
    let kind: BackboneKind = name.parse()?;
    if shape.channels != 3 {
        return Err(FaceError::InvalidConfig(format!(
            "backbones take 3-channel images, got {}",
            shape.channels
        )));
    }
    if shape.height.min(shape.width) < kind.min_input_size() {
        return Err(FaceError::InvalidConfig(format!(
            "{kind} needs images of at least {0}×{0}",
            kind.min_input_size()
        )));
    }
    tracing::debug!("Building backbone '{}' (pretrained: {})", kind, weights_dir.is_some());
    kind.build(weights_dir, device)
}

// ─── Backbone ─────────────────────────────────────────────────────────────────
/// A built feature extractor. Output is always a 4-D feature map.
#[derive(Module, Debug)]
pub enum Backbone<B: Backend> {
    ResNet(resnet::ResNet<B>),
    Plain(plain::PlainNet<B>),
    DenseNet(densenet::DenseNet<B>),
    MobileNetV2(mobile::MobileNet<B>),
    MnasNet(mobile::MobileNet<B>),
    SqueezeNet(squeezenet::SqueezeNet<B>),
    ShuffleNet(shufflenet::ShuffleNet<B>),
    GoogLeNet(googlenet::GoogLeNet<B>),
}

impl<B: Backend> Backbone<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Backbone::ResNet(m)      => m.forward(x),
            Backbone::Plain(m)       => m.forward(x),
            Backbone::DenseNet(m)    => m.forward(x),
            Backbone::MobileNetV2(m) => m.forward_v2(x),
            Backbone::MnasNet(m)     => m.forward_mnas(x),
            Backbone::SqueezeNet(m)  => m.forward(x),
            Backbone::ShuffleNet(m)  => m.forward(x),
            Backbone::GoogLeNet(m)   => m.forward(x),
        }
    }

    /// Flattened output width for one image of `shape`, found by a
    /// single forward pass of a zero tensor.
    pub fn output_width(&self, shape: ImageShape, device: &B::Device) -> usize {
        let [c, h, w] = shape.as_array();
        let blank = Tensor::<B, 4>::zeros([1, c, h, w], device);
        self.forward(blank).dims().iter().product()
    }

    fn with_weights(self, kind: BackboneKind, weights_dir: Option<&Path>, device: &B::Device) -> FaceResult<Self> {
        let Some(dir) = weights_dir else {
            return Ok(self);
        };
        let stem = dir.join(kind.name());
        let file = record_file::<B>(&stem);
        if !file.exists() {
            return Err(FaceError::NotFound(file));
        }
        tracing::info!("Loading pretrained '{}' weights from '{}'", kind, file.display());
        self.load_file(stem, &CompactRecorder::new(), device)
            .map_err(|e| FaceError::InvalidConfig(format!("cannot load weights for '{kind}': {e}")))
    }
}
