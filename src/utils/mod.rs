//! Utility functions shared by the library and the binary.
//!
//! This module provides logging setup and helpers for reading encoded images
//! from disk.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// Defaults to `info` when `RUST_LOG` is unset or invalid. Calling it again
/// is harmless: later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Reads the raw bytes of an image file.
///
/// Decoding is left to the normalizer so that decode failures surface as
/// [`crate::core::DigitError::Decode`].
pub fn read_image_bytes(path: impl AsRef<Path>) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_image_bytes("no/such/digit.png").is_err());
    }
}
