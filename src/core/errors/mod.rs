//! Error handling for digit recognition.

pub mod types;

pub use types::{BoxError, DigitError, DigitResult, ErrorKind};
