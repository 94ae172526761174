//! Splitting image batches into flat, non-overlapping square blocks and back.

use ndarray::{s, Array2, Array4, ArrayView4};

use crate::error::{Error, Result};
use crate::image::GRAY_CHANNELS;

/// Check that `(height, width)` tiles exactly into `block`-sized squares.
pub fn check_tiling(height: usize, width: usize, block: usize) -> Result<()> {
    if height == 0 || width == 0 || height % block != 0 || width % block != 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: format!("both sides must be non-zero multiples of the {block}px block size"),
        });
    }
    Ok(())
}

/// Flatten a `(B, H, W, 1)` batch into rows of `block * block` pixels.
///
/// Rows are ordered by image, then block row, then block column.
pub fn to_blocks(batch: ArrayView4<'_, f32>, block: usize) -> Result<Array2<f32>> {
    let (count, height, width, channels) = batch.dim();
    if channels != GRAY_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("(N, H, W, {GRAY_CHANNELS})"),
            actual: format!("{:?}", batch.shape()),
        });
    }
    check_tiling(height, width, block)?;

    let (rows, cols) = (height / block, width / block);
    let mut blocks = Array2::zeros((count * rows * cols, block * block));

    for n in 0..count {
        for by in 0..rows {
            for bx in 0..cols {
                let tile = batch.slice(s![
                    n,
                    by * block..(by + 1) * block,
                    bx * block..(bx + 1) * block,
                    0
                ]);
                let idx = (n * rows + by) * cols + bx;
                for (dst, &src) in blocks.row_mut(idx).iter_mut().zip(tile.iter()) {
                    *dst = src;
                }
            }
        }
    }

    Ok(blocks)
}

/// Inverse of [`to_blocks`].
pub fn from_blocks(
    blocks: &Array2<f32>,
    count: usize,
    height: usize,
    width: usize,
    block: usize,
) -> Result<Array4<f32>> {
    check_tiling(height, width, block)?;
    let (rows, cols) = (height / block, width / block);

    if blocks.dim() != (count * rows * cols, block * block) {
        return Err(Error::ShapeMismatch {
            expected: format!("({}, {})", count * rows * cols, block * block),
            actual: format!("{:?}", blocks.shape()),
        });
    }

    let mut batch = Array4::zeros((count, height, width, GRAY_CHANNELS));

    for n in 0..count {
        for by in 0..rows {
            for bx in 0..cols {
                let idx = (n * rows + by) * cols + bx;
                let mut tile = batch.slice_mut(s![
                    n,
                    by * block..(by + 1) * block,
                    bx * block..(bx + 1) * block,
                    0
                ]);
                for (dst, &src) in tile.iter_mut().zip(blocks.row(idx).iter()) {
                    *dst = src;
                }
            }
        }
    }

    Ok(batch)
}
