//! Image loading, JPEG degradation, and saving utilities.

mod array;
mod jpeg;
mod load;
mod save;

pub use array::{batch_dims, read_batch, write_batch};
pub use jpeg::{degrade, degrade_batch, Degraded, JpegQuality};
pub use load::{load_dataset, load_grayscale, LoadReport, SkippedFile};
pub use save::{array_to_gray, save_image};

use ndarray::Array4;

/// Image batch in NHWC format (batch, height, width, channels).
/// Values are normalized to [0, 1]; the channel axis always has length 1.
pub type ImageBatch = Array4<f32>;

/// Number of channels in grayscale images.
pub const GRAY_CHANNELS: usize = 1;

/// File extensions picked up when scanning a dataset directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Normalize an 8-bit sample to [0, 1].
#[inline]
pub(crate) fn normalize(value: u8) -> f32 {
    f32::from(value) / 255.0
}

/// Denormalize a value from [0, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn denormalize(value: f32) -> u8 {
    // Truncates like a plain float-to-u8 cast after clamping
    (value * 255.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(0.0), 0);
        assert_eq!(denormalize(0.5), 127);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-0.5), 0);
        assert_eq!(denormalize(1.5), 255);
        assert_eq!(denormalize(f32::NAN), 0);
    }

    #[test]
    fn test_normalize_bounds() {
        assert!(normalize(0).abs() < f32::EPSILON);
        assert!((normalize(255) - 1.0).abs() < f32::EPSILON);
    }
}
