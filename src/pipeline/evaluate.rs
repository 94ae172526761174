//! Inference on the image array and a visual degraded/reconstructed/original grid.

use std::path::PathBuf;

use image::{imageops, DynamicImage, GrayImage, Luma};
use ndarray::{concatenate, s, Array4, Axis};

use crate::error::{Error, Result};
use crate::image::{self as images, ImageBatch};
use crate::metrics::{batch_quality, Quality};
use crate::model::{BlockAutoencoder, Reconstructor};

use super::EvalConfig;

/// Row labels of the comparison grid, top to bottom.
pub const GRID_ROWS: [&str; 3] = ["JPEG", "Reconstructed", "Original"];

/// Outcome of an evaluation run.
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Number of images run through the model.
    pub images: usize,
    /// Model inputs compared against the originals.
    pub input_quality: Quality,
    /// Reconstructions compared against the originals.
    pub reconstructed_quality: Quality,
    /// Mean raw-to-JPEG size ratio. None when inputs were not degraded.
    pub compression_ratio: Option<f64>,
    /// Where the comparison grid was written.
    pub grid: PathBuf,
}

/// Load the model and image array named by `config` and evaluate.
///
/// # Errors
///
/// Returns an error if loading, inference or saving the grid fails, or if
/// the array does not match the size the model was trained on.
pub fn evaluate(config: &EvalConfig) -> Result<EvalReport> {
    config.validate()?;

    let model = BlockAutoencoder::load(&config.model)?;
    let originals = images::read_batch(&config.images)?;

    if let Some((height, width)) = model.trained_size() {
        let dims = images::batch_dims(&originals)?;
        if dims != (height, width) {
            return Err(Error::ShapeMismatch {
                expected: format!("images of {height}x{width} (model training size)"),
                actual: format!("{}x{}", dims.0, dims.1),
            });
        }
    }

    evaluate_model(&model, &originals, config)
}

/// Evaluate any [`Reconstructor`] against `originals`.
///
/// # Errors
///
/// Returns an error if the batch is empty, inference fails, or the grid
/// cannot be saved.
#[allow(clippy::cast_precision_loss)]
pub fn evaluate_model<M: Reconstructor>(
    model: &M,
    originals: &ImageBatch,
    config: &EvalConfig,
) -> Result<EvalReport> {
    config.validate()?;
    images::batch_dims(originals)?;

    let count = originals.len_of(Axis(0));
    if count == 0 {
        return Err(Error::EmptyDataset {
            reason: "image array has no samples".to_string(),
        });
    }

    let (inputs, compression_ratio) = if config.degrade_inputs {
        let (degraded, ratios) = images::degrade_batch(originals, config.quality)?;
        let ratio = ratios.iter().sum::<f64>() / count as f64;
        (degraded, Some(ratio))
    } else {
        tracing::warn!("Feeding stored images to the model without JPEG degradation");
        (originals.clone(), None)
    };

    tracing::info!("Running inference on {count} images");
    let mut outputs = Vec::with_capacity(count.div_ceil(config.batch_size));
    for start in (0..count).step_by(config.batch_size) {
        let end = (start + config.batch_size).min(count);
        let batch = inputs.slice(s![start..end, .., .., ..]).to_owned();
        outputs.push(model.predict(&batch)?);
    }
    let views: Vec<_> = outputs.iter().map(Array4::view).collect();
    let reconstructed = concatenate(Axis(0), &views).map_err(|err| Error::ShapeMismatch {
        expected: format!("{:?}", originals.shape()),
        actual: err.to_string(),
    })?;

    let input_quality = batch_quality(originals, &inputs)?;
    let reconstructed_quality = batch_quality(originals, &reconstructed)?;

    tracing::info!(
        "Input: PSNR {:.2} dB, SSIM {:.4}",
        input_quality.psnr,
        input_quality.ssim
    );
    tracing::info!(
        "Reconstructed: PSNR {:.2} dB, SSIM {:.4}",
        reconstructed_quality.psnr,
        reconstructed_quality.ssim
    );
    if let Some(ratio) = compression_ratio {
        tracing::info!("JPEG compression ratio {ratio:.2}");
    }

    let grid = render_grid(
        [&inputs, &reconstructed, originals],
        config.samples,
        config.gap,
    )?;
    images::save_image(&DynamicImage::ImageLuma8(grid), &config.output)?;
    tracing::info!(
        "Saved comparison grid ({}) to {}",
        GRID_ROWS.join(" / "),
        config.output.display()
    );

    Ok(EvalReport {
        images: count,
        input_quality,
        reconstructed_quality,
        compression_ratio,
        grid: config.output.clone(),
    })
}

/// Lay out the first `samples` images of each batch as one row, on a white
/// background with a `gap`-pixel gutter around every tile.
///
/// # Errors
///
/// Returns an error if the batches differ in shape or are empty.
pub fn render_grid(rows: [&ImageBatch; 3], samples: usize, gap: u32) -> Result<GrayImage> {
    let first = rows[0];
    for row in &rows[1..] {
        if row.dim() != first.dim() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", first.shape()),
                actual: format!("{:?}", row.shape()),
            });
        }
    }

    let (height, width) = images::batch_dims(first)?;
    let columns = samples.min(first.len_of(Axis(0)));
    if columns == 0 {
        return Err(Error::EmptyDataset {
            reason: "no images to lay out".to_string(),
        });
    }

    let too_large = || Error::UnsupportedDimensions {
        width,
        height,
        reason: "grid exceeds u32 range".to_string(),
    };
    let tile_w = u32::try_from(width).map_err(|_| too_large())?;
    let tile_h = u32::try_from(height).map_err(|_| too_large())?;
    let cols = u32::try_from(columns).map_err(|_| too_large())?;
    let row_count = u32::try_from(rows.len()).map_err(|_| too_large())?;

    let mut canvas = GrayImage::from_pixel(
        cols * tile_w + (cols + 1) * gap,
        row_count * tile_h + (row_count + 1) * gap,
        Luma([255]),
    );

    for (r, batch) in (0..row_count).zip(rows) {
        for (c, image) in (0..cols).zip(batch.outer_iter()) {
            let tile = images::array_to_gray(image.index_axis_move(Axis(2), 0))?;
            let x = gap + c * (tile_w + gap);
            let y = gap + r * (tile_h + gap);
            imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(y));
        }
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns its input unchanged.
    struct Identity;

    impl Reconstructor for Identity {
        fn train_batch(&mut self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<f32> {
            self.loss(inputs, targets)
        }

        fn loss(&self, _inputs: &ImageBatch, _targets: &ImageBatch) -> Result<f32> {
            Ok(0.0)
        }

        fn predict(&self, inputs: &ImageBatch) -> Result<Array4<f32>> {
            Ok(inputs.clone())
        }

        fn save(&self, _path: &std::path::Path) -> Result<()> {
            Ok(())
        }
    }

    fn batch(count: usize) -> ImageBatch {
        Array4::from_shape_fn((count, 16, 16, 1), |(n, y, x, _)| {
            ((x * 3 + y * 5 + n * 7) % 16) as f32 / 15.0
        })
    }

    #[test]
    fn test_grid_dimensions() {
        let b = batch(7);
        let grid = render_grid([&b, &b, &b], 5, 4).unwrap();

        assert_eq!(grid.dimensions(), (5 * 16 + 6 * 4, 3 * 16 + 4 * 4));
        // Gutter stays white
        assert_eq!(grid.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_grid_caps_columns_at_batch_size() {
        let b = batch(2);
        let grid = render_grid([&b, &b, &b], 5, 2).unwrap();
        assert_eq!(grid.width(), 2 * 16 + 3 * 2);
    }

    #[test]
    fn test_grid_rows_in_order() {
        let black = Array4::<f32>::zeros((1, 4, 4, 1));
        let white = Array4::<f32>::ones((1, 4, 4, 1));
        let grid = render_grid([&black, &white, &black], 1, 1).unwrap();

        assert_eq!(grid.get_pixel(1, 1)[0], 0);
        assert_eq!(grid.get_pixel(1, 6)[0], 255);
        assert_eq!(grid.get_pixel(1, 11)[0], 0);
    }

    #[test]
    fn test_grid_rejects_mismatched_rows() {
        let a = batch(2);
        let b = batch(3);
        assert!(render_grid([&a, &b, &a], 2, 1).is_err());
    }

    #[test]
    fn test_evaluate_identity_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig {
            output: dir.path().join("grid.png"),
            batch_size: 2,
            ..EvalConfig::default()
        };

        let report = evaluate_model(&Identity, &batch(3), &config).unwrap();

        assert_eq!(report.images, 3);
        assert!(report.grid.exists());
        assert!(report.compression_ratio.is_some_and(|r| r > 0.0));
        // Identity reproduces the degraded input exactly
        assert!((report.input_quality.psnr - report.reconstructed_quality.psnr).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_is_mean_of_degraded_images() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig {
            output: dir.path().join("grid.png"),
            ..EvalConfig::default()
        };
        let originals = batch(2);

        let expected = originals
            .outer_iter()
            .map(|img| {
                images::degrade(img.index_axis(Axis(2), 0), config.quality)
                    .unwrap()
                    .compression_ratio()
            })
            .sum::<f64>()
            / 2.0;
        let report = evaluate_model(&Identity, &originals, &config).unwrap();

        assert!((report.compression_ratio.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_raw_inputs_skip_degradation() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig {
            output: dir.path().join("grid.png"),
            degrade_inputs: false,
            ..EvalConfig::default()
        };

        let report = evaluate_model(&Identity, &batch(2), &config).unwrap();

        assert!(report.compression_ratio.is_none());
        assert!((report.input_quality.psnr - crate::metrics::PSNR_CAP).abs() < f64::EPSILON);
    }
}
