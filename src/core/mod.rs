//! The core module of the digit recognizer.
//!
//! This module contains the fundamental components shared by the normalizer
//! and the inference adapter:
//! - Configuration for scorer loading and ONNX Runtime sessions
//! - Constants describing the model input and output contract
//! - Error handling
//! - The [`Scorer`] capability and its ONNX Runtime implementation

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod traits;

pub use config::{
    OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig, ScorerConfig, parse_device,
};
pub use constants::*;
pub use errors::{BoxError, DigitError, DigitResult, ErrorKind};
pub use inference::{OrtScorer, load_scorer};
pub use traits::Scorer;
