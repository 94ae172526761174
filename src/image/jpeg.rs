//! Lossy JPEG round-trip used to synthesize degraded training inputs.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat};
use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{Error, Result};

use super::{array_to_gray, normalize, ImageBatch};

/// JPEG quality level (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegQuality(u8);

impl JpegQuality {
    /// Quality used when none is given.
    pub const DEFAULT: Self = Self(30);

    /// Create a quality level.
    ///
    /// # Errors
    ///
    /// Returns an error if `quality` is outside 1-100.
    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(Error::invalid("quality", "must be between 1 and 100"));
        }
        Ok(Self(quality))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for JpegQuality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A degraded image together with the size of its JPEG encoding.
#[derive(Debug, Clone)]
pub struct Degraded {
    /// Decoded image, same shape as the input, values in [0, 1].
    pub image: Array2<f32>,
    /// Number of bytes the JPEG encoder produced.
    pub encoded_len: usize,
}

impl Degraded {
    /// Ratio of raw 8-bit pixel bytes to encoded bytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> f64 {
        if self.encoded_len == 0 {
            return 0.0;
        }
        self.image.len() as f64 / self.encoded_len as f64
    }
}

/// Round-trip a normalized grayscale image through the JPEG codec.
///
/// The image is:
/// 1. Denormalized to 8 bits
/// 2. Encoded as JPEG at `quality`
/// 3. Decoded back to a single channel
/// 4. Renormalized to [0, 1]
///
/// # Errors
///
/// Returns an error if the image is empty or the codec fails.
pub fn degrade(image: ArrayView2<'_, f32>, quality: JpegQuality) -> Result<Degraded> {
    let gray = array_to_gray(image)?;

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality.get());
    gray.write_with_encoder(encoder)
        .map_err(|source| Error::Jpeg { source })?;

    let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)
        .map_err(|source| Error::Jpeg { source })?
        .to_luma8();

    Ok(Degraded {
        image: gray_to_array(&decoded),
        encoded_len: encoded.len(),
    })
}

/// Degrade every image of an `(N, H, W, 1)` batch independently.
///
/// Returns the degraded batch and the per-image compression ratios
/// (see [`Degraded::compression_ratio`]).
///
/// # Errors
///
/// Returns an error if any image fails to round-trip.
pub fn degrade_batch(batch: &ImageBatch, quality: JpegQuality) -> Result<(ImageBatch, Vec<f64>)> {
    let mut degraded = batch.clone();
    let mut ratios = Vec::with_capacity(batch.len_of(Axis(0)));

    for (mut out, image) in degraded
        .outer_iter_mut()
        .zip(batch.outer_iter())
    {
        let result = degrade(image.index_axis(Axis(2), 0), quality)?;
        out.index_axis_mut(Axis(2), 0).assign(&result.image);
        ratios.push(result.compression_ratio());
    }

    Ok((degraded, ratios))
}

fn gray_to_array(gray: &GrayImage) -> Array2<f32> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        // Safe: indices come from the image's own u32 dimensions
        #[allow(clippy::cast_possible_truncation)]
        let pixel = gray.get_pixel(x as u32, y as u32);
        normalize(pixel[0])
    })
}
