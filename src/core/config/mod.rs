//! Configuration management for scorer loading.
//!
//! This module provides the ONNX Runtime session options and the scorer
//! loading configuration. Normalizer options live in
//! [`crate::processors::types`].

pub mod onnx;
pub mod scorer;

pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig, parse_device};
pub use scorer::ScorerConfig;
