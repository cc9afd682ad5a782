//! The scorer capability.
//!
//! A scorer maps a [`NormalizedTensor`] to ten raw class scores. It is loaded
//! once, shared read-only across requests, and injected into the inference
//! adapter. Backends (ONNX Runtime, a remote service, a test double) plug in
//! behind this trait without touching normalization or post-processing.

use crate::core::errors::BoxError;
use crate::domain::NormalizedTensor;

/// Produces raw class scores for a normalized digit image.
///
/// Implementations must be safe to call from several threads at once. A
/// backend whose runtime is not reentrant serializes calls internally, as
/// [`crate::core::inference::OrtScorer`] does; callers never lock.
pub trait Scorer: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Scores `tensor`, returning one raw value per class in class order.
    ///
    /// The result is validated by the caller: anything other than ten finite
    /// values is reported as an inference error.
    fn score(&self, tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError>;
}

impl<S: Scorer + ?Sized> Scorer for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn score(&self, tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError> {
        (**self).score(tensor)
    }
}
