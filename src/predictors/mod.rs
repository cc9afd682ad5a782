//! High-level predictors.
//!
//! [`DigitPredictor`] is the inference adapter: it wires the normalizer to an
//! injected scorer and post-processes the scores into a [`Prediction`].
//!
//! [`Prediction`]: crate::domain::Prediction

pub mod digit;

pub use digit::{DigitPredictor, DigitPredictorBuilder, predict_digit, score_tensor};
