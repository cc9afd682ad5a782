//! Domain types exchanged between the normalizer, the scorer and the
//! inference adapter.

pub mod prediction;
pub mod tensor;

pub use prediction::{
    Classification, Prediction, ProbabilityVector, ScoreVector, digit_labels,
};
pub use tensor::NormalizedTensor;
