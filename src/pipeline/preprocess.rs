//! Directory of images -> normalized grayscale array file.

use crate::error::Result;
use crate::image::{self, LoadReport};

use super::PreprocessConfig;

/// Load the dataset described by `config` and write it as one array file.
///
/// Files that fail to decode are listed in the returned report. An empty
/// directory still produces a `(0, H, W, 1)` array.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or the array cannot be written.
pub fn preprocess(config: &PreprocessConfig) -> Result<LoadReport> {
    config.validate()?;

    tracing::info!(
        "Preprocessing {} -> {} at {}x{}",
        config.data_dir.display(),
        config.output.display(),
        config.width,
        config.height
    );

    let report = image::load_dataset(&config.data_dir, config.height, config.width, config.limit)?;
    image::write_batch(&config.output, &report.images)?;

    tracing::info!(
        "Wrote {} images with shape {:?} ({} skipped)",
        report.loaded.len(),
        report.images.shape(),
        report.skipped.len()
    );

    Ok(report)
}
