//! Image normalization for digit classification.
//!
//! This module turns arbitrary encoded images into the fixed
//! `(1, 1, 28, 28)` input tensor of the digit classifier: decode, convert to
//! grayscale, resize, correct polarity, scale to `[0, 1]`.

use crate::core::constants::{INPUT_SIZE, INVERSION_THRESHOLD};
use crate::core::errors::{DigitError, DigitResult};
use crate::domain::NormalizedTensor;
use crate::processors::types::NormalizerConfig;
use image::{DynamicImage, GrayImage, imageops};
use tracing::debug;

/// Converts encoded image bytes into a [`NormalizedTensor`].
///
/// The normalizer holds only its configuration and is safe to share across
/// threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitNormalizer {
    config: NormalizerConfig,
}

impl DigitNormalizer {
    /// Creates a normalizer with the given configuration.
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Decodes `bytes` and normalizes the result.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::Decode`] if the bytes are not a decodable raster
    /// image (this includes an empty buffer). No other failure is possible.
    pub fn normalize(&self, bytes: &[u8]) -> DigitResult<NormalizedTensor> {
        let image = image::load_from_memory(bytes).map_err(DigitError::Decode)?;
        Ok(self.normalize_image(&image))
    }

    /// Normalizes an already decoded image.
    pub fn normalize_image(&self, image: &DynamicImage) -> NormalizedTensor {
        // to_luma8 is a copy for L8 sources and a luminance conversion otherwise
        let gray = image.to_luma8();
        let mut resized = imageops::resize(
            &gray,
            INPUT_SIZE,
            INPUT_SIZE,
            self.config.resize_filter.into(),
        );

        let mean = mean_intensity(&resized);
        let inverted = mean > INVERSION_THRESHOLD;
        if inverted {
            imageops::invert(&mut resized);
        }

        debug!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            mean,
            inverted,
            "normalized input image"
        );

        NormalizedTensor::from_gray(&resized)
    }
}

/// Normalizes `bytes` with the default configuration.
///
/// See [`DigitNormalizer::normalize`].
pub fn normalize(bytes: &[u8]) -> DigitResult<NormalizedTensor> {
    DigitNormalizer::default().normalize(bytes)
}

/// Mean pixel value on the 0-255 scale.
fn mean_intensity(image: &GrayImage) -> f64 {
    let pixels = image.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let sum: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    sum as f64 / pixels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::types::ResizeFilter;
    use image::{ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn assert_valid(tensor: &NormalizedTensor) {
        assert_eq!(tensor.shape(), [1, 1, 28, 28]);
        assert_eq!(tensor.view().shape(), &[1, 1, 28, 28]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(&v)));
    }

    /// Dark stroke (a filled square) on a light background.
    fn dark_on_light(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let in_stroke = x > width / 3 && x < 2 * width / 3 && y > height / 4 && y < 3 * height / 4;
            if in_stroke { Luma([10]) } else { Luma([240]) }
        })
    }

    #[test]
    fn test_shape_invariant_across_color_modes_and_sizes() {
        let normalizer = DigitNormalizer::default();
        for &(w, h) in &[(1, 1), (10, 10), (28, 28), (64, 17), (300, 200)] {
            let gray = DynamicImage::ImageLuma8(dark_on_light(w, h));
            let rgb = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, 128])
            }));
            let rgba = DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, _| {
                Rgba([200, (x % 256) as u8, 30, 255])
            }));

            for image in [gray, rgb, rgba] {
                let tensor = normalizer.normalize(&encode(image)).unwrap();
                assert_valid(&tensor);
            }
        }
    }

    #[test]
    fn test_all_white_becomes_all_zero() {
        let white = GrayImage::from_pixel(10, 10, Luma([255]));
        let tensor = normalize(&encode(DynamicImage::ImageLuma8(white))).unwrap();
        assert_valid(&tensor);
        assert!(tensor.iter().all(|v| v == 0.0));
    }

    #[test]
    fn test_all_white_rgb_becomes_all_zero() {
        let white = RgbImage::from_pixel(50, 30, Rgb([255, 255, 255]));
        let tensor = normalize(&encode(DynamicImage::ImageRgb8(white))).unwrap();
        assert!(tensor.iter().all(|v| v == 0.0));
    }

    #[test]
    fn test_dark_image_is_not_inverted() {
        let normalizer =
            DigitNormalizer::new(NormalizerConfig::new().with_resize_filter(ResizeFilter::Nearest));
        let mut img = GrayImage::new(28, 28);
        img.put_pixel(14, 14, Luma([255]));
        img.put_pixel(3, 20, Luma([102]));

        let tensor = normalizer.normalize(&encode(DynamicImage::ImageLuma8(img))).unwrap();
        let view = tensor.view();
        assert_eq!(view[[0, 0, 14, 14]], 1.0);
        assert_eq!(view[[0, 0, 20, 3]], 0.4);
        assert_eq!(view[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_mean_exactly_at_threshold_is_not_inverted() {
        let normalizer =
            DigitNormalizer::new(NormalizerConfig::new().with_resize_filter(ResizeFilter::Nearest));
        let img = GrayImage::from_pixel(28, 28, Luma([127]));
        let tensor = normalizer.normalize(&encode(DynamicImage::ImageLuma8(img))).unwrap();
        assert!(tensor.iter().all(|v| v == 127.0 / 255.0));

        let img = GrayImage::from_pixel(28, 28, Luma([128]));
        let tensor = normalizer.normalize(&encode(DynamicImage::ImageLuma8(img))).unwrap();
        assert!(tensor.iter().all(|v| v == 127.0 / 255.0));
    }

    #[test]
    fn test_polarity_correction_converges() {
        let threshold = (INVERSION_THRESHOLD / 255.0) as f32;
        for filter in [ResizeFilter::Nearest, ResizeFilter::Triangle, ResizeFilter::CatmullRom] {
            let normalizer = DigitNormalizer::new(NormalizerConfig::new().with_resize_filter(filter));
            let original = dark_on_light(90, 70);
            let mut inverse = original.clone();
            imageops::invert(&mut inverse);

            let a = normalizer
                .normalize(&encode(DynamicImage::ImageLuma8(original)))
                .unwrap();
            let b = normalizer
                .normalize(&encode(DynamicImage::ImageLuma8(inverse)))
                .unwrap();

            assert!(a.mean() <= threshold, "{filter:?}: {}", a.mean());
            assert!(b.mean() <= threshold, "{filter:?}: {}", b.mean());
            assert!((a.mean() - b.mean()).abs() < 0.02);
        }
    }

    #[test]
    fn test_decode_failure() {
        let normalizer = DigitNormalizer::default();
        assert!(matches!(normalizer.normalize(&[]), Err(DigitError::Decode(_))));

        let garbage: Vec<u8> = (0..512u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 7) as u8).collect();
        assert!(matches!(normalizer.normalize(&garbage), Err(DigitError::Decode(_))));

        // valid signature, truncated body
        let mut truncated = encode(DynamicImage::ImageLuma8(dark_on_light(20, 20)));
        truncated.truncate(24);
        assert!(matches!(normalizer.normalize(&truncated), Err(DigitError::Decode(_))));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let bytes = encode(DynamicImage::ImageLuma8(dark_on_light(45, 33)));
        let normalizer = DigitNormalizer::default();
        assert_eq!(normalizer.normalize(&bytes).unwrap(), normalizer.normalize(&bytes).unwrap());
    }

    #[test]
    fn test_mean_intensity() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([255]));
        img.put_pixel(1, 1, Luma([1]));
        assert_eq!(mean_intensity(&img), 64.0);
    }
}
