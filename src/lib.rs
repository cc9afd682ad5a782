//! # digit-recognizer
//!
//! Handwritten digit recognition on top of a pretrained classifier.
//!
//! The crate has two stages, evaluated in sequence for every request:
//!
//! 1. **Normalization** ([`processors::DigitNormalizer`]): encoded image bytes
//!    are decoded, converted to grayscale, resized to 28x28, inverted when the
//!    background is light, and scaled to `[0, 1]`, producing a
//!    `(1, 1, 28, 28)` [`domain::NormalizedTensor`].
//! 2. **Inference** ([`predictors::DigitPredictor`]): an injected
//!    [`core::Scorer`] turns the tensor into ten raw scores, which are
//!    converted with a numerically stable softmax into a
//!    [`domain::ProbabilityVector`]; the most probable digit (lowest index on
//!    ties) and its rounded percentage form the [`domain::Prediction`].
//!
//! The ONNX Runtime scorer is loaded once with [`core::load_scorer`] and
//! shared across threads.
//!
//! ## Example
//!
//! ```rust,no_run
//! use digit_recognizer::predictors::DigitPredictor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let predictor = DigitPredictor::builder().build("models/mnist_cnn_model.onnx")?;
//! let bytes = std::fs::read("digit.png")?;
//! let prediction = predictor.predict(&bytes)?;
//! println!("digit {} ({}%)", prediction.digit, prediction.confidence);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod predictors;
pub mod processors;
pub mod utils;

pub use crate::core::{DigitError, DigitResult, ErrorKind, OrtScorer, Scorer, load_scorer};
pub use crate::domain::{NormalizedTensor, Prediction, ProbabilityVector, ScoreVector};
pub use crate::predictors::{DigitPredictor, predict_digit};
pub use crate::processors::normalize;
