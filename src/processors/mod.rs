//! Image and score processors.
//!
//! - [`normalization`]: encoded image bytes to the model input tensor
//! - [`postprocess`]: raw scores to probabilities, class and confidence
//! - [`types`]: resize options and normalizer configuration

pub mod normalization;
pub mod postprocess;
pub mod types;

pub use normalization::{DigitNormalizer, normalize};
pub use postprocess::{argmax, confidence_percent, round_percent, softmax};
pub use types::{NormalizerConfig, ResizeFilter};
