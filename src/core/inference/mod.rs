//! ONNX Runtime scorer.
//!
//! [`load_scorer`] opens a model file once at startup and returns an
//! [`OrtScorer`], the ONNX Runtime implementation of [`Scorer`].

use crate::core::config::{
    OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig, ScorerConfig,
};
use crate::core::constants::INPUT_SHAPE;
use crate::core::errors::{BoxError, DigitError, DigitResult};
use crate::core::traits::Scorer;
use crate::domain::NormalizedTensor;
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// A scorer backed by one or more ONNX Runtime sessions over the same model.
///
/// Running a session needs exclusive access, so each session sits behind
/// its own mutex and calls are dispatched round-robin across the pool. Only
/// the session run is serialized; normalization happens outside.
pub struct OrtScorer {
    name: String,
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for OrtScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtScorer")
            .field("name", &self.name)
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish()
    }
}

impl OrtScorer {
    /// Name of the model input the tensor is bound to.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Name of the model output the scores are read from.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn session_pool_size(&self) -> usize {
        self.sessions.len()
    }

    fn build_session(path: &Path, config: &ScorerConfig) -> Result<Session, ort::Error> {
        let builder = match &config.ort {
            Some(options) => configured_builder(options)?,
            None => Session::builder()?,
        };
        builder.commit_from_file(path)
    }
}

/// A session builder with every option set in `options` applied.
fn configured_builder(options: &OrtSessionConfig) -> Result<SessionBuilder, ort::Error> {
    let mut builder = Session::builder()?;

    if let Some(n) = options.intra_threads {
        builder = builder.with_intra_threads(n)?;
    }
    if let Some(n) = options.inter_threads {
        builder = builder.with_inter_threads(n)?;
    }
    if let Some(parallel) = options.parallel_execution {
        builder = builder.with_parallel_execution(parallel)?;
    }
    if let Some(level) = options.optimization_level {
        builder = builder.with_optimization_level(graph_level(level))?;
    }
    if let Some(enabled) = options.enable_mem_pattern {
        builder = builder.with_memory_pattern(enabled)?;
    }

    let providers = options
        .execution_providers
        .iter()
        .flatten()
        .map(provider_dispatch)
        .collect::<Result<Vec<_>, _>>()?;
    if !providers.is_empty() {
        builder = builder.with_execution_providers(providers)?;
    }

    Ok(builder)
}

fn graph_level(level: OrtGraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
        OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        OrtGraphOptimizationLevel::Level3 | OrtGraphOptimizationLevel::All => {
            GraphOptimizationLevel::Level3
        }
    }
}

fn provider_dispatch(provider: &OrtExecutionProvider) -> Result<ExecutionProviderDispatch, ort::Error> {
    match provider {
        OrtExecutionProvider::CPU => Ok(CPUExecutionProvider::default().build()),
        #[cfg(feature = "cuda")]
        OrtExecutionProvider::CUDA {
            device_id,
            gpu_mem_limit,
        } => {
            let mut cuda = ort::execution_providers::CUDAExecutionProvider::default();
            if let Some(id) = device_id {
                cuda = cuda.with_device_id(*id);
            }
            if let Some(limit) = gpu_mem_limit {
                cuda = cuda.with_memory_limit(*limit);
            }
            Ok(cuda.build())
        }
        #[cfg(not(feature = "cuda"))]
        OrtExecutionProvider::CUDA { .. } => Err(ort::Error::new(
            "CUDA provider requested in a build without the cuda feature",
        )),
    }
}

impl Scorer for OrtScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, tensor: &NormalizedTensor) -> Result<Vec<f32>, BoxError> {
        let shape: Vec<i64> = INPUT_SHAPE.iter().map(|&d| d as i64).collect();
        let input = TensorRef::from_array_view((shape, tensor.as_slice()))?;

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| format!("session {index} lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| format!("model produced no output named '{}'", self.output_name))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;

        debug!(scorer = %self.name, session = index, shape = ?shape, "scored tensor");
        Ok(data.to_vec())
    }
}

/// Loads an ONNX digit classifier from `locator`.
///
/// Called once at startup. The returned scorer is shared read-only by all
/// later predictions.
///
/// # Errors
///
/// Returns [`DigitError::Load`] when the configuration is invalid, the file
/// does not exist, ONNX Runtime rejects the model, or the model declares no
/// inputs or outputs.
pub fn load_scorer(locator: impl AsRef<Path>, config: &ScorerConfig) -> DigitResult<OrtScorer> {
    let path = locator.as_ref();
    let locator_str = path.display().to_string();

    config
        .validate()
        .map_err(|e| DigitError::load(&locator_str, "invalid scorer configuration", Box::new(e)))?;

    if !path.is_file() {
        return Err(DigitError::load_with_suggestion(
            locator_str,
            "model file not found",
            "check the model path, or export the trained classifier to ONNX first",
            None,
        ));
    }

    info!(
        model = %locator_str,
        sessions = config.session_pool_size,
        "Loading ONNX model"
    );

    let mut sessions = Vec::with_capacity(config.session_pool_size);
    for _ in 0..config.session_pool_size {
        let session = OrtScorer::build_session(path, config).map_err(|e| {
            DigitError::load(&locator_str, "ONNX Runtime rejected the model", Box::new(e))
        })?;
        sessions.push(session);
    }

    let first = &sessions[0];
    let input_name = first.inputs.first().map(|i| i.name.clone()).ok_or_else(|| {
        DigitError::load_with_suggestion(
            &locator_str,
            "model declares no inputs",
            "the model must take one float32 tensor of shape (1, 1, 28, 28)",
            None,
        )
    })?;
    let output_name = first.outputs.first().map(|o| o.name.clone()).ok_or_else(|| {
        DigitError::load_with_suggestion(
            &locator_str,
            "model declares no outputs",
            "the model must return ten class scores",
            None,
        )
    })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| locator_str.clone());

    info!(
        model = %name,
        input = %input_name,
        output = %output_name,
        "Model loaded successfully"
    );

    Ok(OrtScorer {
        name,
        sessions: sessions.into_iter().map(Mutex::new).collect(),
        next: AtomicUsize::new(0),
        input_name,
        output_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    #[test]
    fn test_missing_model_is_a_load_error() {
        let err = load_scorer("does/not/exist/mnist.onnx", &ScorerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
        assert!(err.to_string().contains("model file not found"));
        assert!(err.to_string().contains("suggestion"));
    }

    #[test]
    fn test_invalid_config_is_a_load_error() {
        let config = ScorerConfig::new().with_session_pool_size(0);
        let err = load_scorer("mnist.onnx", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
    }

    #[test]
    fn test_graph_level_mapping() {
        assert!(matches!(
            graph_level(OrtGraphOptimizationLevel::DisableAll),
            GraphOptimizationLevel::Disable
        ));
        assert!(matches!(
            graph_level(OrtGraphOptimizationLevel::All),
            GraphOptimizationLevel::Level3
        ));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_provider_needs_feature() {
        let cuda = OrtExecutionProvider::CUDA {
            device_id: Some(0),
            gpu_mem_limit: None,
        };
        assert!(provider_dispatch(&cuda).is_err());
        assert!(provider_dispatch(&OrtExecutionProvider::CPU).is_ok());
    }

    #[test]
    fn test_directory_is_not_a_model() {
        let dir = std::env::temp_dir();
        let err = load_scorer(&dir, &ScorerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
    }
}
