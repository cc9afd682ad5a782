//! Types used in image processing operations
//!
//! This module defines the options that control how an input image is
//! brought to the model's input resolution.
use std::str::FromStr;

use crate::core::errors::DigitError;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Interpolation used when resizing to the model input size.
///
/// Every filter is deterministic for a given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest neighbor
    Nearest,
    /// Linear (bilinear) filter
    Triangle,
    /// Cubic (bicubic) filter
    #[default]
    #[serde(alias = "bicubic", alias = "catmullrom")]
    CatmullRom,
    /// Gaussian filter
    Gaussian,
    /// Lanczos with window 3
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Implementation of FromStr trait for ResizeFilter to parse a filter name
impl FromStr for ResizeFilter {
    type Err = DigitError;

    /// Parses a filter name, case-insensitively.
    ///
    /// # Returns
    /// * `Ok(ResizeFilter)` - If the string names a known filter
    /// * `Err(DigitError::ConfigError)` - Otherwise
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "triangle" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmull_rom" | "catmullrom" | "bicubic" => Ok(ResizeFilter::CatmullRom),
            "gaussian" => Ok(ResizeFilter::Gaussian),
            "lanczos3" | "lanczos" => Ok(ResizeFilter::Lanczos3),
            other => Err(DigitError::invalid_field(
                "resize_filter",
                "one of nearest, triangle, catmull_rom, gaussian, lanczos3",
                other,
            )),
        }
    }
}

/// Configuration for [`crate::processors::DigitNormalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Interpolation used for the resize to 28x28 (default: catmull_rom)
    #[serde(default)]
    pub resize_filter: ResizeFilter,
}

impl NormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }
}
