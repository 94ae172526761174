//! Configuration for each pipeline stage.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::image::JpegQuality;

/// Default location of the preprocessed image array.
pub const DEFAULT_IMAGES_PATH: &str = "src/images.npy";

/// Default location of the trained model.
pub const DEFAULT_MODEL_PATH: &str = "saved_model/hybrid_compression_autoencoder.json";

/// Configuration for turning a directory of images into an array file.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Directory scanned for `.jpg`, `.jpeg` and `.png` files.
    pub data_dir: PathBuf,

    /// Where the `(N, H, W, 1)` array is written.
    pub output: PathBuf,

    /// Target image height.
    pub height: u32,

    /// Target image width.
    pub width: u32,

    /// Maximum number of images to load.
    pub limit: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/"),
            output: PathBuf::from(DEFAULT_IMAGES_PATH),
            height: 256,
            width: 256,
            limit: 1000,
        }
    }
}

impl PreprocessConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(Error::invalid("size", "height and width must be greater than 0"));
        }

        if self.limit == 0 {
            return Err(Error::invalid("limit", "must be greater than 0"));
        }

        Ok(())
    }
}

/// Configuration for fitting a model on JPEG-degraded inputs.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Array file produced by preprocessing.
    pub images: PathBuf,

    /// Where the trained model is saved.
    pub model: PathBuf,

    /// Number of passes over the training set.
    pub epochs: usize,

    /// Images per optimization step.
    pub batch_size: usize,

    /// Fraction of samples (taken from the end) held out for validation.
    pub validation_split: f64,

    /// Whether to shuffle the training samples every epoch.
    pub shuffle: bool,

    /// JPEG quality used to degrade inputs.
    pub quality: JpegQuality,

    /// Random seed for shuffling. None for random.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            images: PathBuf::from(DEFAULT_IMAGES_PATH),
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            epochs: 50,
            batch_size: 32,
            validation_split: 0.1,
            shuffle: true,
            quality: JpegQuality::DEFAULT,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::invalid("epochs", "must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", "must be greater than 0"));
        }

        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(Error::invalid(
                "validation_split",
                "must be at least 0.0 and below 1.0",
            ));
        }

        Ok(())
    }
}

/// Configuration for evaluating a trained model.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Array file produced by preprocessing.
    pub images: PathBuf,

    /// Trained model to load.
    pub model: PathBuf,

    /// Where the comparison grid is written.
    pub output: PathBuf,

    /// Number of columns in the comparison grid.
    pub samples: usize,

    /// Images per inference call.
    pub batch_size: usize,

    /// JPEG quality used to degrade inputs.
    pub quality: JpegQuality,

    /// Degrade the array before inference. When false the stored images are
    /// fed to the model as-is and labelled as the degraded row.
    pub degrade_inputs: bool,

    /// Gutter between grid tiles, in pixels.
    pub gap: u32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            images: PathBuf::from(DEFAULT_IMAGES_PATH),
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            output: PathBuf::from("evaluation.png"),
            samples: 5,
            batch_size: 32,
            quality: JpegQuality::DEFAULT,
            degrade_inputs: true,
            gap: 4,
        }
    }
}

impl EvalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(Error::invalid("samples", "must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PreprocessConfig::default().validate().unwrap();
        TrainConfig::default().validate().unwrap();
        EvalConfig::default().validate().unwrap();
    }

    #[test]
    fn test_train_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 32);
        assert!((config.validation_split - 0.1).abs() < f64::EPSILON);
        assert!(config.shuffle);
        assert_eq!(config.quality.get(), 30);
    }

    #[test]
    fn test_validation_split_bounds() {
        let mut config = TrainConfig {
            validation_split: 1.0,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());

        config.validation_split = 0.0;
        assert!(config.validate().is_ok());

        config.validation_split = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        let preprocess = PreprocessConfig {
            limit: 0,
            ..PreprocessConfig::default()
        };
        assert!(preprocess.validate().is_err());

        let eval = EvalConfig {
            samples: 0,
            ..EvalConfig::default()
        };
        assert!(eval.validate().is_err());
    }
}
