//! Fitting a [`Reconstructor`] to undo JPEG degradation.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::image::{self, ImageBatch};
use crate::model::Reconstructor;

use super::TrainConfig;

/// Losses recorded at the end of one epoch.
#[derive(Debug, Clone, Copy)]
pub struct EpochStats {
    pub epoch: usize,
    /// Sample-weighted mean of the batch losses.
    pub train_loss: f32,
    /// Loss on the held-out samples, if any were held out.
    pub val_loss: Option<f32>,
}

/// Summary of a training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub epochs: Vec<EpochStats>,
    pub train_samples: usize,
    pub val_samples: usize,
}

impl TrainReport {
    /// Stats of the last completed epoch.
    #[must_use]
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

/// Load the array file, fit `model` on degraded/original pairs and save it.
///
/// # Errors
///
/// Returns an error if the data cannot be loaded, training fails, or the
/// model cannot be saved.
pub fn train<M: Reconstructor>(model: &mut M, config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;

    tracing::info!("Loading images from {}", config.images.display());
    let originals = image::read_batch(&config.images)?;

    let report = fit(model, &originals, config)?;
    model.save(&config.model)?;

    Ok(report)
}

/// Fit `model` to map JPEG-degraded copies of `originals` back to `originals`.
///
/// The last `validation_split` fraction of samples is held out before any
/// shuffling; the rest is shuffled every epoch when `shuffle` is set.
///
/// # Errors
///
/// Returns an error if there is nothing to train on or a batch fails.
#[allow(clippy::cast_precision_loss)]
pub fn fit<M: Reconstructor>(
    model: &mut M,
    originals: &ImageBatch,
    config: &TrainConfig,
) -> Result<TrainReport> {
    config.validate()?;
    image::batch_dims(originals)?;

    let count = originals.len_of(Axis(0));
    if count == 0 {
        return Err(Error::EmptyDataset {
            reason: "image array has no samples".to_string(),
        });
    }

    tracing::info!(
        "Degrading {count} images at JPEG quality {}",
        config.quality.get()
    );
    let (degraded, _) = image::degrade_batch(originals, config.quality)?;

    let split_at = split_index(count, config.validation_split);
    if split_at == 0 {
        return Err(Error::EmptyDataset {
            reason: format!(
                "validation split {} leaves no training samples out of {count}",
                config.validation_split
            ),
        });
    }

    let held_out: Vec<usize> = (split_at..count).collect();
    let validation = (!held_out.is_empty()).then(|| {
        (
            degraded.select(Axis(0), &held_out),
            originals.select(Axis(0), &held_out),
        )
    });

    tracing::info!(
        "Training on {split_at} samples, validating on {} for {} epochs",
        held_out.len(),
        config.epochs
    );

    let mut rng = config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let mut order: Vec<usize> = (0..split_at).collect();

    let pb = ProgressBar::new(config.epochs as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} Training [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut epochs = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        if config.shuffle {
            order.shuffle(&mut rng);
        }

        let mut total = 0.0_f32;
        for chunk in order.chunks(config.batch_size) {
            let inputs = degraded.select(Axis(0), chunk);
            let targets = originals.select(Axis(0), chunk);

            let loss = model.train_batch(&inputs, &targets)?;
            tracing::debug!("epoch {epoch} batch of {}: loss {loss:.6}", chunk.len());
            total += loss * chunk.len() as f32;
        }
        let train_loss = total / split_at as f32;

        let val_loss = validation
            .as_ref()
            .map(|(inputs, targets)| model.loss(inputs, targets))
            .transpose()?;

        match val_loss {
            Some(val) => {
                tracing::info!(
                    "Epoch {epoch}/{}: loss {train_loss:.6}, val_loss {val:.6}",
                    config.epochs
                );
                pb.set_message(format!("loss {train_loss:.5} val {val:.5}"));
            }
            None => {
                tracing::info!("Epoch {epoch}/{}: loss {train_loss:.6}", config.epochs);
                pb.set_message(format!("loss {train_loss:.5}"));
            }
        }
        pb.inc(1);

        epochs.push(EpochStats {
            epoch,
            train_loss,
            val_loss,
        });
    }

    pb.finish_with_message("Training complete");

    Ok(TrainReport {
        epochs,
        train_samples: split_at,
        val_samples: held_out.len(),
    })
}

/// Number of leading samples used for training.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn split_index(count: usize, validation_split: f64) -> usize {
    // Safe: validation_split is in [0, 1), so the product is in [0, count]
    ((count as f64) * (1.0 - validation_split)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AutoencoderConfig, BlockAutoencoder};
    use ndarray::Array4;

    fn blocks(count: usize) -> ImageBatch {
        Array4::from_shape_fn((count, 16, 16, 1), |(n, y, x, _)| {
            if (x / 4 + y / 4 + n) % 2 == 0 {
                0.75
            } else {
                0.25
            }
        })
    }

    fn model() -> BlockAutoencoder {
        BlockAutoencoder::new(AutoencoderConfig {
            block: 8,
            latent: 16,
            learning_rate: 1e-2,
            seed: Some(3),
        })
        .unwrap()
    }

    #[test]
    fn test_split_index() {
        assert_eq!(split_index(10, 0.1), 9);
        assert_eq!(split_index(3, 0.1), 2);
        assert_eq!(split_index(1, 0.1), 0);
        assert_eq!(split_index(5, 0.0), 5);
    }

    #[test]
    fn test_fit_records_every_epoch() {
        let config = TrainConfig {
            epochs: 3,
            batch_size: 2,
            seed: Some(1),
            ..TrainConfig::default()
        };
        let mut model = model();
        let report = fit(&mut model, &blocks(10), &config).unwrap();

        assert_eq!(report.epochs.len(), 3);
        assert_eq!(report.train_samples, 9);
        assert_eq!(report.val_samples, 1);
        assert!(report.epochs.iter().all(|e| e.val_loss.is_some()));
        assert_eq!(report.last().map(|e| e.epoch), Some(3));
    }

    #[test]
    fn test_fit_reduces_loss() {
        let config = TrainConfig {
            epochs: 40,
            batch_size: 4,
            validation_split: 0.0,
            seed: Some(5),
            ..TrainConfig::default()
        };
        let mut model = model();
        let report = fit(&mut model, &blocks(4), &config).unwrap();

        let first = report.epochs[0].train_loss;
        let last = report.epochs[39].train_loss;
        assert!(last < first, "{first} -> {last}");
        assert!(report.epochs[0].val_loss.is_none());
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let mut model = model();
        let err = fit(&mut model, &Array4::zeros((0, 16, 16, 1)), &TrainConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataset { .. }));
    }

    #[test]
    fn test_single_sample_with_split_rejected() {
        let mut model = model();
        let err = fit(&mut model, &blocks(1), &TrainConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset { .. }));
    }
}
