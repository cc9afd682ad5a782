//! Digit Predictor
//!
//! This module provides the high-level API for handwritten digit
//! classification: normalize the image, run the scorer, turn raw scores into
//! a probability distribution and pick the most probable digit.

use crate::core::config::{OrtSessionConfig, ScorerConfig};
use crate::core::errors::{DigitError, DigitResult};
use crate::core::inference::load_scorer;
use crate::core::traits::Scorer;
use crate::domain::{NormalizedTensor, Prediction, ScoreVector};
use crate::processors::postprocess::{argmax, confidence_percent, softmax};
use crate::processors::{DigitNormalizer, NormalizerConfig, ResizeFilter};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Predicts the digit in `bytes` using the default normalizer.
///
/// # Errors
///
/// * [`DigitError::Decode`] if the bytes are not an image. Checked first, so a
///   bad image is reported as such even when no scorer is loaded.
/// * [`DigitError::ScorerUnavailable`] if `scorer` is `None`.
/// * [`DigitError::Inference`] if the scorer fails or returns anything but ten
///   finite scores.
pub fn predict_digit(bytes: &[u8], scorer: Option<&dyn Scorer>) -> DigitResult<Prediction> {
    predict_with(&DigitNormalizer::default(), bytes, scorer)
}

fn predict_with(
    normalizer: &DigitNormalizer,
    bytes: &[u8],
    scorer: Option<&dyn Scorer>,
) -> DigitResult<Prediction> {
    let tensor = normalizer.normalize(bytes)?;
    let scorer = scorer.ok_or_else(|| DigitError::scorer_unavailable("no scorer is loaded"))?;
    score_tensor(&tensor, scorer)
}

/// Runs `scorer` on an already normalized tensor and post-processes the result.
pub fn score_tensor(tensor: &NormalizedTensor, scorer: &dyn Scorer) -> DigitResult<Prediction> {
    let raw = scorer
        .score(tensor)
        .map_err(|e| DigitError::scorer_failed(scorer.name(), e))?;
    let scores = ScoreVector::try_from_raw(raw, scorer.name())?;

    let probabilities = softmax(&scores);
    let class = argmax(probabilities.as_slice());
    let confidence = probabilities.get(class).map(confidence_percent).unwrap_or(0);

    debug!(
        scorer = scorer.name(),
        digit = class,
        confidence,
        "digit predicted"
    );

    Ok(Prediction {
        digit: class as u8,
        confidence,
        probabilities,
    })
}

/// Digit predictor
///
/// Holds a normalizer and an optional shared scorer. A predictor without a
/// scorer still decodes input, then answers every request with
/// [`DigitError::ScorerUnavailable`].
#[derive(Clone)]
pub struct DigitPredictor {
    normalizer: DigitNormalizer,
    scorer: Option<Arc<dyn Scorer>>,
}

impl std::fmt::Debug for DigitPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitPredictor")
            .field("normalizer", &self.normalizer)
            .field("scorer", &self.scorer.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl DigitPredictor {
    /// Create a new builder for the digit predictor
    pub fn builder() -> DigitPredictorBuilder {
        DigitPredictorBuilder::new()
    }

    /// Creates a predictor from its parts.
    pub fn new(normalizer: DigitNormalizer, scorer: Option<Arc<dyn Scorer>>) -> Self {
        Self { normalizer, scorer }
    }

    /// Whether a scorer is loaded.
    pub fn is_ready(&self) -> bool {
        self.scorer.is_some()
    }

    /// Name of the loaded scorer, if any.
    pub fn scorer_name(&self) -> Option<&str> {
        self.scorer.as_deref().map(|s| s.name())
    }

    pub fn normalizer(&self) -> &DigitNormalizer {
        &self.normalizer
    }

    /// Predict the digit in one encoded image.
    pub fn predict(&self, bytes: &[u8]) -> DigitResult<Prediction> {
        predict_with(&self.normalizer, bytes, self.scorer.as_deref())
    }

    /// Predict digits for several images in parallel.
    ///
    /// Results keep input order; one failing image does not affect the others.
    pub fn predict_batch<B>(&self, images: &[B]) -> Vec<DigitResult<Prediction>>
    where
        B: AsRef<[u8]> + Sync,
    {
        images
            .par_iter()
            .map(|bytes| self.predict(bytes.as_ref()))
            .collect()
    }
}

/// Builder for the digit predictor
pub struct DigitPredictorBuilder {
    normalizer_config: NormalizerConfig,
    scorer_config: ScorerConfig,
    scorer: Option<Arc<dyn Scorer>>,
}

impl DigitPredictorBuilder {
    pub fn new() -> Self {
        Self {
            normalizer_config: NormalizerConfig::default(),
            scorer_config: ScorerConfig::default(),
            scorer: None,
        }
    }

    /// Sets the interpolation used when resizing to 28x28.
    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.normalizer_config.resize_filter = filter;
        self
    }

    /// Sets the number of ONNX Runtime sessions kept for concurrent calls.
    pub fn session_pool_size(mut self, size: usize) -> Self {
        self.scorer_config.session_pool_size = size;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.scorer_config.ort = Some(config);
        self
    }

    /// Uses an already constructed scorer instead of loading a model.
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Builds a predictor around the scorer given to [`Self::with_scorer`].
    ///
    /// Without one, the predictor reports every request as
    /// [`DigitError::ScorerUnavailable`].
    pub fn build_with_scorer(self) -> DigitPredictor {
        DigitPredictor::new(DigitNormalizer::new(self.normalizer_config), self.scorer)
    }

    /// Loads the model at `model_path` and builds the predictor.
    ///
    /// # Errors
    ///
    /// Propagates [`DigitError::Load`] from [`load_scorer`].
    pub fn build<P: AsRef<Path>>(self, model_path: P) -> DigitResult<DigitPredictor> {
        let scorer = load_scorer(model_path, &self.scorer_config)?;
        Ok(DigitPredictor::new(
            DigitNormalizer::new(self.normalizer_config),
            Some(Arc::new(scorer)),
        ))
    }

    /// Loads the model at `model_path`; on failure logs the error and returns
    /// a predictor without a scorer instead of failing.
    pub fn build_or_degrade<P: AsRef<Path>>(self, model_path: P) -> DigitPredictor {
        let normalizer = DigitNormalizer::new(self.normalizer_config);
        match load_scorer(model_path.as_ref(), &self.scorer_config) {
            Ok(scorer) => {
                info!(scorer = scorer.name(), "digit predictor ready");
                DigitPredictor::new(normalizer, Some(Arc::new(scorer)))
            }
            Err(e) => {
                error!(
                    model = %model_path.as_ref().display(),
                    error = %e,
                    "failed to load scorer; predictions will be rejected"
                );
                DigitPredictor::new(normalizer, None)
            }
        }
    }
}

impl Default for DigitPredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{BoxError, ErrorKind};
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed logits.
    struct FixedScorer(Vec<f32>);

    impl Scorer for FixedScorer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError> {
            Ok(self.0.clone())
        }
    }

    struct FailingScorer;

    impl Scorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        fn score(&self, _tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError> {
            Err("runtime exploded".into())
        }
    }

    /// Counts calls and records the mean of each tensor it sees.
    #[derive(Default)]
    struct RecordingScorer {
        calls: AtomicUsize,
        means: Mutex<Vec<f32>>,
    }

    impl Scorer for RecordingScorer {
        fn name(&self) -> &str {
            "recording"
        }

        fn score(&self, tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.means.lock().unwrap().push(tensor.mean());
            assert_eq!(tensor.shape(), [1, 1, 28, 28]);
            let mut logits = vec![0.0; 10];
            logits[7] = 5.0;
            Ok(logits)
        }
    }

    fn png(image: GrayImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn digit_png() -> Vec<u8> {
        png(GrayImage::from_fn(40, 40, |x, _| {
            if (18..22).contains(&x) { Luma([255]) } else { Luma([0]) }
        }))
    }

    #[test]
    fn test_predict_digit_end_to_end() {
        let mut logits = vec![0.0; 10];
        logits[3] = 4.0;
        logits[8] = 2.0;
        let scorer = FixedScorer(logits);

        let prediction = predict_digit(&digit_png(), Some(&scorer)).unwrap();
        assert_eq!(prediction.digit, 3);
        assert!((prediction.probabilities.sum() - 1.0).abs() < 1e-6);

        let p3 = prediction.probabilities.get(3).unwrap();
        assert_eq!(prediction.confidence, confidence_percent(p3));
        // e^4 / (e^4 + e^2 + 8)
        let expected = 4f32.exp() / (4f32.exp() + 2f32.exp() + 8.0);
        assert!((p3 - expected).abs() < 1e-6);
        assert_eq!(prediction.confidence, 78);
    }

    #[test]
    fn test_tie_selects_lowest_class() {
        let mut logits = vec![-1.0; 10];
        logits[2] = 6.0;
        logits[5] = 6.0;
        let prediction = predict_digit(&digit_png(), Some(&FixedScorer(logits))).unwrap();
        assert_eq!(prediction.digit, 2);
        assert_eq!(prediction.confidence, 50);
    }

    #[test]
    fn test_uniform_scores() {
        let prediction = predict_digit(&digit_png(), Some(&FixedScorer(vec![1.5; 10]))).unwrap();
        assert_eq!(prediction.digit, 0);
        assert_eq!(prediction.confidence, 10);
    }

    #[test]
    fn test_missing_scorer_is_unavailable() {
        let err = predict_digit(&digit_png(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScorerUnavailable);
    }

    #[test]
    fn test_decode_error_takes_precedence() {
        let err = predict_digit(b"definitely not an image", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let scorer = RecordingScorer::default();
        let err = predict_digit(&[], Some(&scorer)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scorer_failure_is_inference_error() {
        let err = predict_digit(&digit_png(), Some(&FailingScorer)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        assert!(err.to_string().contains("failing"));
    }

    #[test]
    fn test_malformed_scores_are_inference_errors() {
        for raw in [vec![0.0; 9], vec![0.0; 11], Vec::new()] {
            let err = predict_digit(&digit_png(), Some(&FixedScorer(raw))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Inference);
        }

        let mut raw = vec![0.0; 10];
        raw[1] = f32::NAN;
        let err = predict_digit(&digit_png(), Some(&FixedScorer(raw))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
    }

    #[test]
    fn test_scorer_sees_inverted_tensor_for_light_background() {
        let scorer = Arc::new(RecordingScorer::default());
        let predictor = DigitPredictor::builder()
            .with_scorer(scorer.clone())
            .build_with_scorer();

        let white = png(GrayImage::from_pixel(10, 10, Luma([255])));
        let prediction = predictor.predict(&white).unwrap();
        assert_eq!(prediction.digit, 7);
        assert_eq!(scorer.means.lock().unwrap().as_slice(), &[0.0]);
    }

    #[test]
    fn test_predictor_without_scorer() {
        let predictor = DigitPredictor::builder().build_with_scorer();
        assert!(!predictor.is_ready());
        assert!(predictor.scorer_name().is_none());
        assert_eq!(
            predictor.predict(&digit_png()).unwrap_err().kind(),
            ErrorKind::ScorerUnavailable
        );
    }

    #[test]
    fn test_build_or_degrade_with_missing_model() {
        let predictor = DigitPredictor::builder()
            .resize_filter(ResizeFilter::Triangle)
            .build_or_degrade("no/such/model.onnx");
        assert!(!predictor.is_ready());
        assert_eq!(predictor.normalizer().config().resize_filter, ResizeFilter::Triangle);
        assert_eq!(
            predictor.predict(&digit_png()).unwrap_err().kind(),
            ErrorKind::ScorerUnavailable
        );
    }

    #[test]
    fn test_build_with_missing_model_fails() {
        let err = DigitPredictor::builder().build("no/such/model.onnx").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
    }

    #[test]
    fn test_predict_batch_keeps_order_and_isolates_failures() {
        let scorer = Arc::new(RecordingScorer::default());
        let predictor = DigitPredictor::builder()
            .with_scorer(scorer.clone())
            .build_with_scorer();

        let images = vec![digit_png(), b"junk".to_vec(), digit_png()];
        let results = predictor.predict_batch(&images);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().digit, 7);
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Decode);
        assert_eq!(results[2].as_ref().unwrap().digit, 7);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_predictor_is_shareable_across_threads() {
        let scorer = Arc::new(RecordingScorer::default());
        let predictor = Arc::new(
            DigitPredictor::builder()
                .with_scorer(scorer.clone())
                .build_with_scorer(),
        );
        let bytes = Arc::new(digit_png());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let predictor = Arc::clone(&predictor);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || predictor.predict(&bytes).map(|p| p.digit))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 7);
        }
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 8);
    }
}
