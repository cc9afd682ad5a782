//! Configuration types for the digit server and CLI.

use digit_recognizer::processors::ResizeFilter;
use std::path::PathBuf;

/// Configuration for digit prediction
#[derive(Clone, Debug)]
pub struct DigitConfig {
    pub model: PathBuf,
    pub device: String,
    /// Optional JSON file with ONNX Runtime session options
    pub ort_config: Option<PathBuf>,
    pub session_pool_size: usize,
    /// Intra-op threads per session; ONNX Runtime picks when unset
    pub threads: Option<usize>,
    pub resize_filter: ResizeFilter,
}

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub digit: DigitConfig,
    pub host: String,
    pub port: u16,
    /// Directory served at /static/samples
    pub samples_dir: PathBuf,
    /// Where grayscale display copies of uploads are written, if anywhere
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}
