//! The normalized model input tensor.

use crate::core::constants::{INPUT_SHAPE, INPUT_SIZE, MAX_PIXEL_VALUE};
use crate::core::errors::{DigitError, DigitResult};
use image::GrayImage;
use ndarray::{Array4, ArrayView4};

/// A `(1, 1, 28, 28)` `f32` tensor with every value in `[0.0, 1.0]`.
///
/// Instances are only created through the normalizer or through
/// [`NormalizedTensor::try_from_array`], so the shape and range invariants
/// always hold. The data is kept in standard (row-major) layout and is never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    /// Builds a tensor from a 28x28 grayscale image, scaling by `1/255`.
    ///
    /// Callers must pass an image of exactly `INPUT_SIZE x INPUT_SIZE`.
    pub(crate) fn from_gray(image: &GrayImage) -> Self {
        debug_assert_eq!(image.dimensions(), (INPUT_SIZE, INPUT_SIZE));
        let data = Array4::from_shape_fn(INPUT_SHAPE, |(_, _, y, x)| {
            f32::from(image.get_pixel(x as u32, y as u32)[0]) / MAX_PIXEL_VALUE
        });
        Self { data }
    }

    /// Wraps an existing array after checking shape and value range.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::InvalidInput`] if the shape is not
    /// `(1, 1, 28, 28)` or any value lies outside `[0, 1]` (NaN included).
    pub fn try_from_array(data: Array4<f32>) -> DigitResult<Self> {
        if data.shape() != INPUT_SHAPE {
            return Err(DigitError::InvalidInput {
                message: format!(
                    "expected tensor shape {:?}, got {:?}",
                    INPUT_SHAPE,
                    data.shape()
                ),
            });
        }
        if let Some(bad) = data.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(DigitError::InvalidInput {
                message: format!("tensor value {bad} outside [0, 1]"),
            });
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { data })
    }

    /// Always `[1, 1, 28, 28]`.
    pub fn shape(&self) -> [usize; 4] {
        INPUT_SHAPE
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// The 784 values in row-major (NCHW) order, index `y * 28 + x`.
    pub fn as_slice(&self) -> &[f32] {
        // every constructor leaves the array in standard layout
        self.data.as_slice().unwrap_or_default()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.as_slice().to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied()
    }

    /// Mean value over all 784 elements.
    pub fn mean(&self) -> f32 {
        self.data.mean().unwrap_or(0.0)
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}
