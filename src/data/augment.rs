// ============================================================
// Layer 4 — Image Augmentation
// ============================================================
// Stochastic per-fetch augmentation of face crops.
//
// Each fetch of a training sample:
//
//   CHW f32 in [0,1]
//       │  ×255, clamp, cast to u8, HWC
//       ▼
//   RgbImage ──► Augmentation::apply (random draws per call)
//       │  ÷255, CHW
//       ▼
//   CHW f32 in [0,1]
//
// Nothing is cached, so every epoch sees a different version
// of the same face.
//
// The default pipeline (face_training) is:
//   horizontal flip            p = 0.5
//   additive gaussian noise    p = 0.2
//   rotation within ±180°      p = 0.9  (border reflected, not filled)
//   one of {equalise, brightness, gamma}      p = 0.9
//   one of {sharpen, blur, motion blur}       p = 0.9
//   one of {contrast, hue shift}              p = 0.9

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::{
    contrast::equalize_histogram,
    filter::{box_filter, sharpen3x3},
    geometric_transformations::{rotate_about_center, Interpolation},
    noise::gaussian_noise,
};
use rand::Rng;

use crate::domain::sample::ImageShape;

// ─── Transform ────────────────────────────────────────────────────────────────
/// A single image transform. Random parameters are drawn at apply time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    HorizontalFlip,
    /// Zero-mean noise, std drawn from [min_std, max_std] (8-bit scale)
    GaussianNoise { min_std: f64, max_std: f64 },
    /// Angle drawn uniformly from [-limit, limit] degrees
    Rotate { limit_degrees: f32 },
    /// Per-channel histogram equalisation
    Equalize,
    /// Shift drawn from [-limit, limit] as a fraction of full range
    Brightness { limit: f32 },
    /// Gamma drawn from [low, high]
    Gamma { low: f32, high: f32 },
    Sharpen,
    /// Box blur with a square kernel
    Blur { kernel: u32 },
    /// Box blur along a randomly chosen axis
    MotionBlur { kernel: u32 },
    /// Contrast change drawn from [-limit, limit] as a fraction
    Contrast { limit: f32 },
    /// Hue rotation drawn from [-limit, limit] degrees
    HueShift { limit_degrees: i32 },
}

impl Transform {
    pub fn apply<R: Rng + ?Sized>(&self, img: RgbImage, rng: &mut R) -> RgbImage {
        match *self {
            Transform::HorizontalFlip => imageops::flip_horizontal(&img),

            Transform::GaussianNoise { min_std, max_std } => {
                let std = rng.gen_range(min_std..=max_std);
                gaussian_noise(&img, 0.0, std, rng.gen())
            }

            Transform::Rotate { limit_degrees } => {
                let angle = rng.gen_range(-limit_degrees..=limit_degrees);
                rotate_reflect(&img, angle.to_radians())
            }

            Transform::Equalize => map_channels(&img, equalize_histogram),

            Transform::Brightness { limit } => {
                let shift = rng.gen_range(-limit..=limit) * 255.0;
                imageops::brighten(&img, shift.round() as i32)
            }

            Transform::Gamma { low, high } => {
                let gamma = rng.gen_range(low..=high);
                let lut: Vec<u8> = (0..=255u16)
                    .map(|v| (255.0 * (v as f32 / 255.0).powf(gamma)).round().clamp(0.0, 255.0) as u8)
                    .collect();
                let mut out = img;
                for px in out.pixels_mut() {
                    for c in px.0.iter_mut() {
                        *c = lut[*c as usize];
                    }
                }
                out
            }

            Transform::Sharpen => map_channels(&img, sharpen3x3),

            Transform::Blur { kernel } => {
                let r = kernel / 2;
                map_channels(&img, |g| box_filter(g, r, r))
            }

            Transform::MotionBlur { kernel } => {
                let r = kernel / 2;
                if rng.gen_bool(0.5) {
                    map_channels(&img, |g| box_filter(g, r, 0))
                } else {
                    map_channels(&img, |g| box_filter(g, 0, r))
                }
            }

            Transform::Contrast { limit } => {
                let pct = rng.gen_range(-limit..=limit) * 100.0;
                imageops::contrast(&img, pct)
            }

            Transform::HueShift { limit_degrees } => {
                let deg = rng.gen_range(-limit_degrees..=limit_degrees);
                imageops::huerotate(&img, deg)
            }
        }
    }
}

/// Rotate about the centre. Corners uncovered by the rotation are filled by
/// mirroring the image across its borders instead of with a flat colour.
fn rotate_reflect(img: &RgbImage, theta: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    // Enough margin that the half-diagonal stays inside, plus one pixel for bilinear taps
    let half_diag = ((w as f32).powi(2) + (h as f32).powi(2)).sqrt() / 2.0;
    let pad_x = (half_diag - w as f32 / 2.0).ceil() as u32 + 1;
    let pad_y = (half_diag - h as f32 / 2.0).ceil() as u32 + 1;

    let padded = RgbImage::from_fn(w + 2 * pad_x, h + 2 * pad_y, |x, y| {
        let sx = reflect_101(x as i64 - pad_x as i64, w);
        let sy = reflect_101(y as i64 - pad_y as i64, h);
        *img.get_pixel(sx, sy)
    });
    let rotated = rotate_about_center(&padded, theta, Interpolation::Bilinear, Rgb([0, 0, 0]));
    imageops::crop_imm(&rotated, pad_x, pad_y, w, h).to_image()
}

/// Mirror index `i` into `0..len` without repeating the edge pixel
/// (`-1 → 1`, `len → len - 2`).
fn reflect_101(i: i64, len: u32) -> u32 {
    let n = len as i64;
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - m }) as u32
}

/// Run a grayscale operation on each RGB channel independently.
fn map_channels<F>(img: &RgbImage, op: F) -> RgbImage
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let (w, h) = img.dimensions();
    let planes: Vec<GrayImage> = (0..3)
        .map(|c| op(&GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[c]]))))
        .collect();
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            planes[0].get_pixel(x, y)[0],
            planes[1].get_pixel(x, y)[0],
            planes[2].get_pixel(x, y)[0],
        ])
    })
}

// ─── Step ─────────────────────────────────────────────────────────────────────
/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Apply the transform with probability `p`
    Maybe { p: f64, transform: Transform },
    /// With probability `p`, apply exactly one of `choices` (uniform)
    OneOf { p: f64, choices: Vec<Transform> },
}

// ─── Augmentation ─────────────────────────────────────────────────────────────
/// A composed pipeline of steps, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    steps: Vec<Step>,
}

impl Augmentation {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The pipeline used for training face crops.
    pub fn face_training() -> Self {
        Self::new(vec![
            Step::Maybe { p: 0.5, transform: Transform::HorizontalFlip },
            Step::Maybe {
                p: 0.2,
                transform: Transform::GaussianNoise { min_std: 0.01 * 255.0, max_std: 0.05 * 255.0 },
            },
            Step::Maybe { p: 0.9, transform: Transform::Rotate { limit_degrees: 180.0 } },
            Step::OneOf {
                p: 0.9,
                choices: vec![
                    Transform::Equalize,
                    Transform::Brightness { limit: 0.2 },
                    Transform::Gamma { low: 0.8, high: 1.2 },
                ],
            },
            Step::OneOf {
                p: 0.9,
                choices: vec![
                    Transform::Sharpen,
                    Transform::Blur { kernel: 3 },
                    Transform::MotionBlur { kernel: 3 },
                ],
            },
            Step::OneOf {
                p: 0.9,
                choices: vec![
                    Transform::Contrast { limit: 0.2 },
                    Transform::HueShift { limit_degrees: 20 },
                ],
            },
        ])
    }

    pub fn apply<R: Rng + ?Sized>(&self, mut img: RgbImage, rng: &mut R) -> RgbImage {
        for step in &self.steps {
            img = match step {
                Step::Maybe { p, transform } => {
                    if rng.gen_bool(p.clamp(0.0, 1.0)) {
                        transform.apply(img, rng)
                    } else {
                        img
                    }
                }
                Step::OneOf { p, choices } => {
                    if !choices.is_empty() && rng.gen_bool(p.clamp(0.0, 1.0)) {
                        let pick = choices[rng.gen_range(0..choices.len())];
                        pick.apply(img, rng)
                    } else {
                        img
                    }
                }
            };
        }
        img
    }

    /// Augment one CHW float image (values in [0, 1]); output is CHW in [0, 1].
    pub fn augment_chw<R: Rng + ?Sized>(&self, chw: &[f32], shape: ImageShape, rng: &mut R) -> Vec<f32> {
        let img = chw_to_rgb(chw, shape);
        let img = self.apply(img, rng);
        rgb_to_chw(&img, shape.channels)
    }
}

// ─── Layout conversion ────────────────────────────────────────────────────────
/// CHW floats → HWC bytes. Single-channel images are replicated to RGB.
pub fn chw_to_rgb(chw: &[f32], shape: ImageShape) -> RgbImage {
    let ImageShape { channels, height, width } = shape;
    let plane = height * width;
    let to_byte = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let offset = y as usize * width + x as usize;
        let mut px = [0u8; 3];
        for (c, slot) in px.iter_mut().enumerate() {
            let src = if channels == 1 { 0 } else { c.min(channels - 1) };
            *slot = to_byte(chw[src * plane + offset]);
        }
        Rgb(px)
    })
}

/// HWC bytes → CHW floats in [0, 1]. For one channel the RGB mean is kept.
pub fn rgb_to_chw(img: &RgbImage, channels: usize) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut out = vec![0.0f32; channels * plane];

    for (x, y, px) in img.enumerate_pixels() {
        let offset = y as usize * w as usize + x as usize;
        if channels == 1 {
            let sum: u32 = px.0.iter().map(|&v| v as u32).sum();
            out[offset] = sum as f32 / 3.0 / 255.0;
        } else {
            for c in 0..channels.min(3) {
                out[c * plane + offset] = px[c] as f32 / 255.0;
            }
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Scale → bytes → augment → rescale keeps every value in [0, 1].
        #[test]
        fn augmented_pixels_stay_in_unit_range(
            pixels in proptest::collection::vec(0.0f32..=1.0, 3 * 12 * 12),
            seed in any::<u64>(),
        ) {
            let shape = ImageShape::new(3, 12, 12);
            let mut rng = StdRng::seed_from_u64(seed);
            let out = Augmentation::face_training().augment_chw(&pixels, shape, &mut rng);
            prop_assert_eq!(out.len(), pixels.len());
            prop_assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
