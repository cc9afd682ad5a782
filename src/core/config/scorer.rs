//! Configuration for loading a scorer.

use super::onnx::OrtSessionConfig;
use crate::core::errors::{DigitError, DigitResult};
use serde::{Deserialize, Serialize};

/// How a scorer is loaded and how many sessions it keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Number of independent sessions; concurrent calls are spread across them (default: 1)
    #[serde(default = "ScorerConfig::default_session_pool_size")]
    pub session_pool_size: usize,
    /// ONNX Runtime session options
    #[serde(default)]
    pub ort: Option<OrtSessionConfig>,
}

impl ScorerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_session_pool_size() -> usize {
        1
    }

    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    pub fn with_ort_config(mut self, ort: OrtSessionConfig) -> Self {
        self.ort = Some(ort);
        self
    }

    /// Checks that the configuration can produce a working scorer.
    pub fn validate(&self) -> DigitResult<()> {
        if self.session_pool_size == 0 {
            return Err(DigitError::invalid_field(
                "session_pool_size",
                "at least 1",
                self.session_pool_size.to_string(),
            ));
        }
        if let Some(threads) = self.ort.as_ref().and_then(|o| o.intra_threads)
            && threads == 0
        {
            return Err(DigitError::invalid_field("intra_threads", "at least 1", "0"));
        }
        Ok(())
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            session_pool_size: Self::default_session_pool_size(),
            ort: None,
        }
    }
}
