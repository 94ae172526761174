//! Image array file I/O (`.npy`).

use std::fs;
use std::path::Path;

use ndarray_npy::{read_npy, write_npy};

use crate::error::{Error, Result};

use super::{ImageBatch, GRAY_CHANNELS};

/// Write an image batch to disk, creating parent directories as needed.
///
/// Any existing file at `path` is overwritten.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be written.
pub fn write_batch<P: AsRef<Path>>(path: P, batch: &ImageBatch) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    write_npy(path, batch).map_err(|source| Error::ArrayWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an image batch and check that it is laid out as `(N, H, W, 1)`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has the wrong shape.
pub fn read_batch<P: AsRef<Path>>(path: P) -> Result<ImageBatch> {
    let path = path.as_ref();

    let batch: ImageBatch = read_npy(path).map_err(|source| Error::ArrayRead {
        path: path.to_path_buf(),
        source,
    })?;

    batch_dims(&batch)?;
    Ok(batch)
}

/// Return `(height, width)` of a batch, rejecting anything that is not single-channel.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the channel axis is not 1.
pub fn batch_dims(batch: &ImageBatch) -> Result<(usize, usize)> {
    let (_, height, width, channels) = batch.dim();

    if channels != GRAY_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("(N, H, W, {GRAY_CHANNELS})"),
            actual: format!("{:?}", batch.shape()),
        });
    }

    Ok((height, width))
}
