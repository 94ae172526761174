//! Image loading utilities.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, ImageError, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array4};

use crate::error::{Error, Result};

use super::{normalize, ImageBatch, GRAY_CHANNELS, IMAGE_EXTENSIONS};

/// A dataset file that was picked up by extension but could not be decoded.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a dataset directory.
#[derive(Debug)]
pub struct LoadReport {
    /// Stacked images, shape `(loaded, height, width, 1)`.
    pub images: ImageBatch,
    /// Files that made it into `images`, in order.
    pub loaded: Vec<PathBuf>,
    /// Files that failed to decode. They do not count toward the limit.
    pub skipped: Vec<SkippedFile>,
}

/// Load an image from disk as a normalized grayscale array.
///
/// The image is:
/// 1. Loaded from the specified path, format sniffed from the file contents
/// 2. Converted to single-channel luma
/// 3. Resized to `height` x `width` with bilinear filtering
/// 4. Normalized to [0, 1] range
///
/// # Errors
///
/// Returns an error if the image cannot be loaded.
pub fn load_grayscale<P: AsRef<Path>>(path: P, height: u32, width: u32) -> Result<Array2<f32>> {
    let path = path.as_ref();

    let img = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(ImageError::IoError)
        .and_then(ImageReader::decode)
        .map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(image_to_array(&img, height, width))
}

/// Load up to `limit` images from `dir` into one `(N, height, width, 1)` batch.
///
/// Files are visited in file-name order. Only files with a recognized
/// extension are considered; undecodable ones are reported in
/// [`LoadReport::skipped`] and do not count toward `limit`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a parameter is zero.
pub fn load_dataset<P: AsRef<Path>>(
    dir: P,
    height: u32,
    width: u32,
    limit: usize,
) -> Result<LoadReport> {
    let dir = dir.as_ref();

    if height == 0 || width == 0 {
        return Err(Error::invalid("size", "height and width must be greater than 0"));
    }
    if limit == 0 {
        return Err(Error::invalid("limit", "must be greater than 0"));
    }

    let candidates = list_candidates(dir)?;
    tracing::info!(
        "Found {} candidate images in {}",
        candidates.len(),
        dir.display()
    );

    let pb = ProgressBar::new(candidates.len().min(limit) as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} Loading [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let pixels_per_image = height as usize * width as usize;
    let mut data = Vec::with_capacity(candidates.len().min(limit) * pixels_per_image);
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();

    for path in candidates {
        if loaded.len() >= limit {
            break;
        }

        match load_grayscale(&path, height, width) {
            Ok(array) => {
                data.extend(array.iter().copied());
                loaded.push(path);
                pb.inc(1);
            }
            Err(err) => {
                tracing::warn!("Skipping {}: {err}", path.display());
                skipped.push(SkippedFile {
                    reason: err.to_string(),
                    path,
                });
            }
        }
    }

    pb.finish_and_clear();

    let shape = (loaded.len(), height as usize, width as usize, GRAY_CHANNELS);
    let images = Array4::from_shape_vec(shape, data).map_err(|_| Error::ShapeMismatch {
        expected: format!("{shape:?}"),
        actual: "reshape failed".to_string(),
    })?;

    if loaded.is_empty() {
        tracing::warn!("No images could be loaded from {}", dir.display());
    }

    Ok(LoadReport {
        images,
        loaded,
        skipped,
    })
}

/// List files with a recognized image extension, sorted by path.
fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Convert a `DynamicImage` to a normalized `(height, width)` array.
fn image_to_array(img: &DynamicImage, height: u32, width: u32) -> Array2<f32> {
    let gray = img.to_luma8();
    let resized = image::imageops::resize(&gray, width, height, FilterType::Triangle);

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        // Safe: x and y are bounded by the u32 target dimensions
        #[allow(clippy::cast_possible_truncation)]
        let pixel = resized.get_pixel(x as u32, y as u32);
        normalize(pixel[0])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_array_shape() {
        let img = DynamicImage::new_rgb8(100, 60);
        let array = image_to_array(&img, 32, 48);

        assert_eq!(array.dim(), (32, 48));
    }

    #[test]
    fn test_normalization_range() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([255])));
        let array = image_to_array(&img, 8, 8);

        let min = array.iter().copied().fold(f32::INFINITY, f32::min);
        let max = array.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // White image should be all 1.0
        assert!((min - 1.0).abs() < 0.01);
        assert!((max - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_image_extension(Path::new("a.png")));
        assert!(has_image_extension(Path::new("b.JPG")));
        assert!(has_image_extension(Path::new("c.jpeg")));
        assert!(!has_image_extension(Path::new("d.txt")));
        assert!(!has_image_extension(Path::new("png")));
    }

    #[test]
    fn test_limit_and_zero_params() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            GrayImage::from_pixel(12, 12, Luma([i * 40]))
                .save(dir.path().join(format!("img{i}.png")))
                .unwrap();
        }

        let report = load_dataset(dir.path(), 8, 8, 2).unwrap();
        assert_eq!(report.images.dim(), (2, 8, 8, 1));
        assert!(report.loaded[0].ends_with("img0.png"));
        assert!(report.loaded[1].ends_with("img1.png"));

        assert!(load_dataset(dir.path(), 8, 8, 0).is_err());
        assert!(load_dataset(dir.path(), 0, 8, 1).is_err());
    }

    #[test]
    fn test_undecodable_files_reported() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(12, 12, Luma([100]))
            .save(dir.path().join("good.png"))
            .unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let report = load_dataset(dir.path(), 8, 8, 10).unwrap();
        assert_eq!(report.images.dim(), (1, 8, 8, 1));
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("broken.jpg"));
    }

    #[test]
    fn test_format_detected_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        GrayImage::from_pixel(12, 12, Luma([255]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let array = load_grayscale(&path, 8, 8).unwrap();
        assert!(array.iter().all(|&v| (v - 1.0).abs() < 0.01));

        let report = load_dataset(dir.path(), 8, 8, 10).unwrap();
        assert_eq!(report.images.dim(), (1, 8, 8, 1));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(dir.path().join("absent"), 8, 8, 1).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
