//! Image quality metrics for images normalized to [0, 1].

use ndarray::{Array2, ArrayView2, Axis, Zip};

use crate::error::{Error, Result};
use crate::image::{batch_dims, ImageBatch};

/// PSNR reported for (near-)identical images.
pub const PSNR_CAP: f64 = 100.0;

/// Gaussian window radius used by [`ssim`] (11x11 window).
const SSIM_RADIUS: usize = 5;

/// Gaussian window sigma used by [`ssim`].
const SSIM_SIGMA: f64 = 1.5;

const SSIM_C1: f64 = 0.01 * 0.01;
const SSIM_C2: f64 = 0.03 * 0.03;

/// Mean PSNR and SSIM over a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality {
    pub psnr: f64,
    pub ssim: f64,
}

/// Peak signal-to-noise ratio in dB (higher is better, >40 dB is excellent).
///
/// # Errors
///
/// Returns an error if the images differ in shape or are empty.
#[allow(clippy::cast_precision_loss)]
pub fn psnr(reference: ArrayView2<'_, f32>, test: ArrayView2<'_, f32>) -> Result<f64> {
    check_pair(reference, test)?;

    let mut sum = 0.0_f64;
    Zip::from(reference).and(test).for_each(|&a, &b| {
        let d = f64::from(a) - f64::from(b);
        sum += d * d;
    });
    let mse = sum / reference.len() as f64;

    if mse < 1e-10 {
        Ok(PSNR_CAP)
    } else {
        Ok(10.0 * (1.0 / mse).log10())
    }
}

/// Structural similarity with an 11x11 Gaussian window (sigma 1.5).
///
/// Only windows that fit entirely inside the image are averaged; images
/// smaller than the window use the largest window that fits.
///
/// # Errors
///
/// Returns an error if the images differ in shape or are empty.
#[allow(clippy::cast_precision_loss)]
pub fn ssim(reference: ArrayView2<'_, f32>, test: ArrayView2<'_, f32>) -> Result<f64> {
    check_pair(reference, test)?;

    let (height, width) = reference.dim();
    let radius = SSIM_RADIUS.min((height.min(width) - 1) / 2);
    let kernel = gaussian_kernel(radius, SSIM_SIGMA);

    let a = reference.mapv(f64::from);
    let b = test.mapv(f64::from);

    let mu_a = filter_valid(&a, &kernel);
    let mu_b = filter_valid(&b, &kernel);
    let aa = filter_valid(&(&a * &a), &kernel);
    let bb = filter_valid(&(&b * &b), &kernel);
    let ab = filter_valid(&(&a * &b), &kernel);

    let mut total = 0.0_f64;
    Zip::from(&mu_a)
        .and(&mu_b)
        .and(&aa)
        .and(&bb)
        .and(&ab)
        .for_each(|&ma, &mb, &saa, &sbb, &sab| {
            let var_a = saa - ma * ma;
            let var_b = sbb - mb * mb;
            let cov = sab - ma * mb;

            let num = (2.0 * ma * mb + SSIM_C1) * (2.0 * cov + SSIM_C2);
            let den = (ma * ma + mb * mb + SSIM_C1) * (var_a + var_b + SSIM_C2);
            total += num / den;
        });

    Ok(total / mu_a.len() as f64)
}

/// Mean PSNR and SSIM of `test` against `reference`, image by image.
///
/// # Errors
///
/// Returns an error if the batches differ in shape or are empty.
#[allow(clippy::cast_precision_loss)]
pub fn batch_quality(reference: &ImageBatch, test: &ImageBatch) -> Result<Quality> {
    batch_dims(reference)?;
    if reference.dim() != test.dim() {
        return Err(Error::ShapeMismatch {
            expected: format!("{:?}", reference.shape()),
            actual: format!("{:?}", test.shape()),
        });
    }

    let count = reference.len_of(Axis(0));
    if count == 0 {
        return Err(Error::EmptyDataset {
            reason: "no images to compare".to_string(),
        });
    }

    let mut quality = Quality {
        psnr: 0.0,
        ssim: 0.0,
    };

    for (r, t) in reference.outer_iter().zip(test.outer_iter()) {
        let (r, t) = (r.index_axis_move(Axis(2), 0), t.index_axis_move(Axis(2), 0));
        quality.psnr += psnr(r, t)?;
        quality.ssim += ssim(r, t)?;
    }

    quality.psnr /= count as f64;
    quality.ssim /= count as f64;
    Ok(quality)
}

fn check_pair(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(Error::ShapeMismatch {
            expected: format!("{:?}", a.shape()),
            actual: format!("{:?}", b.shape()),
        });
    }
    if a.is_empty() {
        return Err(Error::EmptyDataset {
            reason: "image has no pixels".to_string(),
        });
    }
    Ok(())
}

/// Normalized 1-D Gaussian of length `2 * radius + 1`.
#[allow(clippy::cast_precision_loss)]
fn gaussian_kernel(radius: usize, sigma: f64) -> Vec<f64> {
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable convolution keeping only fully covered positions.
fn filter_valid(img: &Array2<f64>, kernel: &[f64]) -> Array2<f64> {
    let k = kernel.len();
    let (height, width) = img.dim();
    let (out_h, out_w) = (height + 1 - k, width + 1 - k);

    let horizontal = Array2::from_shape_fn((height, out_w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, w)| w * img[[y, x + i]])
            .sum::<f64>()
    });

    Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, w)| w * horizontal[[y + i, x]])
            .sum::<f64>()
    })
}
