//! Trainable image-to-image models.
//!
//! The pipeline only talks to [`Reconstructor`]; [`BlockAutoencoder`] is the
//! architecture shipped with the crate.

mod autoencoder;
mod patches;

pub use autoencoder::{AutoencoderConfig, BlockAutoencoder};

use std::path::Path;

use ndarray::Array4;

use crate::error::Result;
use crate::image::ImageBatch;

/// A trainable mapping from degraded `(B, H, W, 1)` images to reconstructions
/// of the same shape.
pub trait Reconstructor {
    /// Run one optimization step on a batch.
    ///
    /// Returns the mean squared error of the batch before the update.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch shapes are incompatible with the model.
    fn train_batch(&mut self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<f32>;

    /// Mean squared error of the model's predictions, without updating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch shapes are incompatible with the model.
    fn loss(&self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<f32>;

    /// Predict reconstructions for a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch shape is incompatible with the model.
    fn predict(&self, inputs: &ImageBatch) -> Result<Array4<f32>>;

    /// Persist architecture and weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, path: &Path) -> Result<()>;
}
