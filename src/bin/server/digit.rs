//! Digit prediction logic shared between CLI and server modes.

use crate::config::DigitConfig;
use digit_recognizer::core::config::{OrtSessionConfig, parse_device};
use digit_recognizer::core::{DigitError, ErrorKind};
use digit_recognizer::domain::Prediction;
use digit_recognizer::predictors::{DigitPredictor, DigitPredictorBuilder};
use image::ImageFormat;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to save display copy: {0}")]
    Save(String),

    #[error(transparent)]
    Digit(#[from] DigitError),
}

/// A single ranked class in a response
#[derive(Debug, Serialize)]
pub struct RankedDigit {
    pub digit: usize,
    pub probability: f32,
}

/// Response from digit prediction
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digit: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probabilities: Vec<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top: Vec<RankedDigit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl PredictResponse {
    pub fn from_prediction(
        prediction: &Prediction,
        image_path: Option<String>,
        processing_time_ms: f64,
    ) -> Self {
        Self {
            success: true,
            digit: Some(prediction.digit),
            confidence: Some(prediction.confidence),
            probabilities: prediction.probabilities.to_vec(),
            top: prediction
                .top_k(3)
                .into_iter()
                .map(|c| RankedDigit {
                    digit: c.class_id,
                    probability: c.score,
                })
                .collect(),
            image_path,
            error: None,
            processing_time_ms: Some(processing_time_ms),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            digit: None,
            confidence: None,
            probabilities: Vec::new(),
            top: Vec::new(),
            image_path: None,
            error: Some(message),
            processing_time_ms: None,
        }
    }
}

/// Digit engine wrapper for thread-safe access
pub struct DigitEngine {
    predictor: DigitPredictor,
}

impl DigitEngine {
    /// Create an engine, failing if the model cannot be loaded
    pub fn new(config: &DigitConfig) -> Result<Self, AppError> {
        let predictor = predictor_builder(config)?.build(&config.model)?;
        Ok(Self { predictor })
    }

    /// Create an engine that starts without a scorer if the model cannot be
    /// loaded; its predictions then fail with `ScorerUnavailable`
    pub fn new_degraded(config: &DigitConfig) -> Result<Self, AppError> {
        let predictor = predictor_builder(config)?.build_or_degrade(&config.model);
        Ok(Self { predictor })
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_ready()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.predictor.scorer_name()
    }

    /// Predict the digit in encoded image bytes
    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, DigitError> {
        self.predictor.predict(bytes)
    }
}

/// Thread-safe digit engine wrapped in Arc
pub type SharedDigitEngine = Arc<DigitEngine>;

fn predictor_builder(config: &DigitConfig) -> Result<DigitPredictorBuilder, AppError> {
    let mut builder = DigitPredictor::builder()
        .resize_filter(config.resize_filter)
        .session_pool_size(config.session_pool_size);

    if let Some(ort_config) = load_ort_config(config)? {
        builder = builder.ort_config(ort_config);
    }
    Ok(builder)
}

/// Combine the optional JSON session options with the device selection.
///
/// A non-CPU device overrides any execution providers from the file, and
/// `threads` overrides the file's intra-op thread count.
fn load_ort_config(config: &DigitConfig) -> Result<Option<OrtSessionConfig>, AppError> {
    let from_file = config
        .ort_config
        .as_ref()
        .map(OrtSessionConfig::from_json_file)
        .transpose()
        .map_err(|e| AppError::Config(e.to_string()))?;
    let from_device = parse_device(&config.device).map_err(|e| AppError::Config(e.to_string()))?;

    let merged = match (from_file, from_device) {
        (Some(file), Some(device)) => Some(OrtSessionConfig {
            execution_providers: device.execution_providers,
            ..file
        }),
        (file, device) => file.or(device),
    };

    Ok(match config.threads {
        Some(threads) => Some(merged.unwrap_or_default().with_intra_threads(threads)),
        None => merged,
    })
}

/// Whether a prediction error is the caller's fault
pub fn is_client_error(err: &DigitError) -> bool {
    matches!(err.kind(), ErrorKind::Decode | ErrorKind::InvalidInput)
}

/// Download bytes from a URL
pub async fn download_bytes(url: &str) -> Result<Vec<u8>, AppError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| AppError::Download(format!("Failed to fetch URL: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Download(format!("Failed to read response body: {}", e)))?;

    Ok(bytes.to_vec())
}

/// Reduce an uploaded filename to a safe basename.
///
/// Keeps ASCII letters, digits, `.`, `_` and `-`, turns whitespace into `_`,
/// drops path components, and strips leading dots and underscores. Returns
/// an empty string when nothing usable is left.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Save a grayscale display copy of the uploaded image into `dir`.
///
/// Returns the path of the written file.
pub fn save_display_copy(bytes: &[u8], dir: &Path, filename: &str) -> Result<PathBuf, AppError> {
    let mut name = secure_filename(filename);
    if name.is_empty() {
        name = format!("upload-{}", uuid::Uuid::new_v4());
    }

    let mut path = dir.join(name);
    if ImageFormat::from_path(&path).is_err() {
        path.set_extension("png");
    }

    let image = image::load_from_memory(bytes).map_err(|e| AppError::Save(e.to_string()))?;
    std::fs::create_dir_all(dir).map_err(|e| AppError::Save(e.to_string()))?;
    image
        .to_luma8()
        .save(&path)
        .map_err(|e| AppError::Save(e.to_string()))?;
    Ok(path)
}
