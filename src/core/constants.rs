//! Constants shared by the normalizer, the scorers and the adapter.

/// Spatial side length of the model input, in pixels.
pub const INPUT_SIZE: u32 = 28;

/// Shape of the model input tensor: (batch, channels, height, width).
pub const INPUT_SHAPE: [usize; 4] = [1, 1, INPUT_SIZE as usize, INPUT_SIZE as usize];

/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Mean intensity (0-255 scale) above which the image is inverted.
///
/// The classifier expects a light stroke on a dark background.
pub const INVERSION_THRESHOLD: f64 = 127.0;

/// Maximum pixel intensity of an 8-bit grayscale image.
pub const MAX_PIXEL_VALUE: f32 = 255.0;
