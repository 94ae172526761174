//! Image saving utilities.

use std::fs;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use ndarray::ArrayView2;

use crate::error::{Error, Result};

use super::denormalize;

/// Save an image, creating parent directories as needed.
///
/// The format is inferred from the extension (PNG when there is none).
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_image<P: AsRef<Path>>(img: &DynamicImage, path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let format = image::ImageFormat::from_path(path).unwrap_or(image::ImageFormat::Png);

    img.save_with_format(path, format)
        .map_err(|source| Error::ImageSave {
            path: path.to_path_buf(),
            source,
        })
}

/// Convert a normalized `(H, W)` array to an 8-bit grayscale image.
///
/// # Errors
///
/// Returns an error if the array is empty or too large for the image crate.
pub fn array_to_gray(array: ArrayView2<'_, f32>) -> Result<GrayImage> {
    let (height, width) = array.dim();

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "exceeds u32 range".to_string(),
        });
    };

    if w == 0 || h == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "image is empty".to_string(),
        });
    }

    Ok(GrayImage::from_fn(w, h, |x, y| {
        Luma([denormalize(array[[y as usize, x as usize]])])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_array_to_gray_orientation() {
        // 2 rows, 3 columns; bottom-right pixel is white
        let mut array = Array2::<f32>::zeros((2, 3));
        array[[1, 2]] = 1.0;

        let gray = array_to_gray(array.view()).unwrap();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(2, 1)[0], 255);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_empty_array_rejected() {
        let array = Array2::<f32>::zeros((0, 4));
        assert!(matches!(
            array_to_gray(array.view()),
            Err(Error::UnsupportedDimensions { .. })
        ));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("tile.png");

        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        save_image(&img, &path).unwrap();

        assert!(path.exists());
    }
}
