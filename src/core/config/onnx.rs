//! ONNX Runtime configuration types and utilities.

use crate::core::errors::{DigitError, DigitResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Graph optimization levels for ONNX Runtime.
///
/// This enum represents the different levels of graph optimization that can be applied
/// during ONNX Runtime session creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
    /// Enable all optimizations (alias for Level3).
    All,
}

/// Execution providers for ONNX Runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider (requires the `cuda` feature)
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
        /// Memory limit in bytes (optional)
        gpu_mem_limit: Option<usize>,
    },
}

/// Configuration for ONNX Runtime sessions.
///
/// Every field is optional; unset fields keep ONNX Runtime's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    #[serde(default)]
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    #[serde(default)]
    pub inter_threads: Option<usize>,
    /// Enable parallel execution mode
    #[serde(default)]
    pub parallel_execution: Option<bool>,
    /// Graph optimization level
    #[serde(default)]
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    #[serde(default)]
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// Enable memory pattern optimization
    #[serde(default)]
    pub enable_mem_pattern: Option<bool>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::ConfigError`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> DigitResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| DigitError::ConfigError {
            message: format!("cannot read ONNX Runtime config '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&text).map_err(|e| DigitError::ConfigError {
            message: format!("'{}': {e}", path.display()),
        })
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(text: &str) -> DigitResult<Self> {
        serde_json::from_str(text).map_err(|e| DigitError::ConfigError {
            message: format!("invalid ONNX Runtime config: {e}"),
        })
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the execution providers, in order of preference.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }
}

/// Builds a session configuration from a device string.
///
/// # Supported formats
///
/// - `"cpu"` -> `Ok(None)`, CPU is the default
/// - `"cuda"` or `"cuda:N"` -> CUDA provider with CPU fallback (needs the `cuda` feature)
pub fn parse_device(device: &str) -> DigitResult<Option<OrtSessionConfig>> {
    let device_lower = device.trim().to_lowercase();

    if device_lower == "cpu" {
        return Ok(None);
    }

    if device_lower.starts_with("cuda") {
        let device_id = if device_lower == "cuda" {
            0
        } else if let Some(id_str) = device_lower.strip_prefix("cuda:") {
            id_str
                .parse::<i32>()
                .map_err(|_| DigitError::invalid_field("device", "cuda:N", device))?
        } else {
            return Err(DigitError::invalid_field("device", "'cuda' or 'cuda:N'", device));
        };

        if !cfg!(feature = "cuda") {
            return Err(DigitError::ConfigError {
                message: format!("CUDA device '{device}' requested but the cuda feature is not enabled"),
            });
        }

        let config = OrtSessionConfig::new().with_execution_providers(vec![
            OrtExecutionProvider::CUDA {
                device_id: Some(device_id),
                gpu_mem_limit: None,
            },
            OrtExecutionProvider::CPU,
        ]);
        return Ok(Some(config));
    }

    Err(DigitError::invalid_field("device", "cpu, cuda or cuda:N", device))
}
