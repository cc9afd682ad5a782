//! Core error types for digit recognition.
//!
//! This module defines the [`DigitError`] enum shared by the normalizer, the
//! scorer backends and the inference adapter, together with [`ErrorKind`],
//! a fieldless view of the same taxonomy that callers can match on.

use thiserror::Error;

/// Boxed error type used as the source of scorer and loader failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a [`DigitError`].
///
/// Request handlers use this to pick a response status without inspecting
/// error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input bytes are not a decodable raster image.
    Decode,
    /// No usable scorer is loaded.
    ScorerUnavailable,
    /// The scorer failed or produced output outside its contract.
    Inference,
    /// The scorer could not be loaded.
    Load,
    /// A caller-provided value violates an invariant.
    InvalidInput,
    /// A configuration value is invalid.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Decode => write!(f, "decode"),
            ErrorKind::ScorerUnavailable => write!(f, "scorer unavailable"),
            ErrorKind::Inference => write!(f, "inference"),
            ErrorKind::Load => write!(f, "load"),
            ErrorKind::InvalidInput => write!(f, "invalid input"),
            ErrorKind::Config => write!(f, "configuration"),
        }
    }
}

/// Errors produced while turning image bytes into a digit prediction.
///
/// Every variant is scoped to a single request or a single load attempt;
/// none of them leaves shared state behind.
#[derive(Error, Debug)]
pub enum DigitError {
    /// The input bytes could not be parsed as a raster image.
    #[error("image decode failed")]
    Decode(#[source] image::ImageError),

    /// No scorer is available, either because loading failed at startup or
    /// because none was supplied.
    #[error("scorer unavailable: {reason}")]
    ScorerUnavailable {
        /// Why no scorer is available.
        reason: String,
    },

    /// The scorer ran but failed or returned a malformed score vector.
    #[error("inference failed in scorer '{scorer}': {context}")]
    Inference {
        /// Name of the scorer that was invoked.
        scorer: String,
        /// What went wrong.
        context: String,
        /// The underlying error, when the scorer itself raised one.
        #[source]
        source: Option<BoxError>,
    },

    /// The scorer could not be loaded from its locator.
    #[error("scorer load failed for '{locator}': {reason}{suggestion}")]
    Load {
        /// The model locator (usually a file path).
        locator: String,
        /// Short reason string.
        reason: String,
        /// Optional suggestion (prefixed with '; ' when present).
        suggestion: String,
        /// Underlying source error.
        #[source]
        source: Option<BoxError>,
    },

    /// A caller-provided value violates an invariant.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// A configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },
}

impl From<image::ImageError> for DigitError {
    fn from(error: image::ImageError) -> Self {
        Self::Decode(error)
    }
}

impl DigitError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DigitError::Decode(_) => ErrorKind::Decode,
            DigitError::ScorerUnavailable { .. } => ErrorKind::ScorerUnavailable,
            DigitError::Inference { .. } => ErrorKind::Inference,
            DigitError::Load { .. } => ErrorKind::Load,
            DigitError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DigitError::ConfigError { .. } => ErrorKind::Config,
        }
    }

    /// Creates a scorer-unavailable error.
    pub fn scorer_unavailable(reason: impl Into<String>) -> Self {
        Self::ScorerUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an inference error for output that violates the score-vector
    /// contract.
    pub fn malformed_scores(scorer: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Inference {
            scorer: scorer.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Wraps an error raised by a scorer while it was running.
    pub fn scorer_failed(scorer: impl Into<String>, source: BoxError) -> Self {
        Self::Inference {
            scorer: scorer.into(),
            context: "scorer raised an error".to_string(),
            source: Some(source),
        }
    }

    /// Creates a load error with a recovery suggestion.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use digit_recognizer::core::errors::DigitError;
    /// let err = DigitError::load_with_suggestion(
    ///     "models/mnist.onnx",
    ///     "file not found",
    ///     "check the --model path",
    ///     None,
    /// );
    /// assert!(err.to_string().contains("suggestion: check the --model path"));
    /// ```
    pub fn load_with_suggestion(
        locator: impl Into<String>,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::Load {
            locator: locator.into(),
            reason: reason.into(),
            suggestion: format!("; suggestion: {}", suggestion.into()),
            source,
        }
    }

    /// Creates a load error without a suggestion.
    pub fn load(locator: impl Into<String>, reason: impl Into<String>, source: BoxError) -> Self {
        Self::Load {
            locator: locator.into(),
            reason: reason.into(),
            suggestion: String::new(),
            source: Some(source),
        }
    }

    /// Creates a configuration error for invalid field values.
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type DigitResult<T> = Result<T, DigitError>;
