//! Block autoencoder: a dense encoder/decoder applied to every JPEG-aligned tile.
//!
//! Each `block x block` tile is flattened and mapped through
//! `relu(x W_enc + b_enc)` into a latent code, then back through
//! `sigmoid(h W_dec + b_dec)`, so reconstructions stay in [0, 1].
//!
//! The network is a burn [`Module`] trained on the `Autodiff<NdArray>` CPU
//! backend. Inference and loss evaluation run on the plain `NdArray` backend.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use burn::module::{AutodiffModule, Module, Param};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Initializer, Linear, LinearConfig, Relu};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use ndarray::{Array2, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::{batch_dims, ImageBatch};

use super::patches::{check_tiling, from_blocks, to_blocks};
use super::Reconstructor;

/// Tag written into every model file.
const MODEL_FORMAT: &str = "jpegrestore-block-autoencoder";

/// Current model file version. Version 1 stored raw weight matrices.
const MODEL_VERSION: u32 = 2;

type Valid = NdArray<f32>;
type Train = Autodiff<Valid>;

/// Hyper-parameters of a [`BlockAutoencoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderConfig {
    /// Side of the square tiles, in pixels. 8 matches the JPEG DCT grid.
    pub block: usize,

    /// Size of the latent code per tile.
    pub latent: usize,

    /// Adam learning rate.
    pub learning_rate: f32,

    /// Seed for weight initialization. None for random.
    #[serde(skip)]
    pub seed: Option<u64>,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            block: 8,
            latent: 32,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

impl AutoencoderConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.block == 0 {
            return Err(Error::invalid("block", "must be greater than 0"));
        }

        if self.latent == 0 {
            return Err(Error::invalid("latent", "must be greater than 0"));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::invalid("learning_rate", "must be a positive number"));
        }

        Ok(())
    }

    const fn block_pixels(&self) -> usize {
        self.block * self.block
    }
}

/// Adam with the Keras defaults; the learning rate is passed on every step.
fn adam() -> OptimizerAdaptor<Adam, Network<Train>, Train> {
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-7)
        .init()
}

/// Encoder maps `block² -> latent`, decoder maps back.
#[derive(Module, Debug)]
struct Network<B: Backend> {
    encoder: Linear<B>,
    decoder: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Network<B> {
    /// Zero-filled layers of the configured shape.
    fn zeros(config: &AutoencoderConfig, device: &B::Device) -> Self {
        let (pixels, latent) = (config.block_pixels(), config.latent);
        Self {
            encoder: LinearConfig::new(pixels, latent)
                .with_initializer(Initializer::Zeros)
                .init(device),
            decoder: LinearConfig::new(latent, pixels)
                .with_initializer(Initializer::Zeros)
                .init(device),
            activation: Relu::new(),
        }
    }

    /// Xavier-uniform weights drawn from `rng`, zero biases.
    #[allow(clippy::cast_precision_loss)]
    fn with_xavier(
        mut self,
        config: &AutoencoderConfig,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Self {
        let (pixels, latent) = (config.block_pixels(), config.latent);
        let limit = (6.0 / (pixels + latent) as f32).sqrt();
        let mut uniform = |rows: usize, cols: usize| {
            let values: Vec<f32> = (0..rows * cols)
                .map(|_| rng.random_range(-limit..limit))
                .collect();
            Param::from_tensor(
                Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols]),
            )
        };

        self.encoder.weight = uniform(pixels, latent);
        self.decoder.weight = uniform(latent, pixels);
        self
    }

    fn check(&self, config: &AutoencoderConfig) -> Result<()> {
        let (pixels, latent) = (config.block_pixels(), config.latent);
        let checks = [
            (self.encoder.weight.val().dims(), [pixels, latent]),
            (self.decoder.weight.val().dims(), [latent, pixels]),
        ];

        for (actual, expected) in checks {
            if actual != expected {
                return Err(Error::ShapeMismatch {
                    expected: format!("{expected:?}"),
                    actual: format!("{actual:?}"),
                });
            }
        }

        Ok(())
    }

    fn forward(&self, blocks: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = self.activation.forward(self.encoder.forward(blocks));
        sigmoid(self.decoder.forward(hidden))
    }
}

/// On-disk representation of a trained model.
#[derive(Serialize, Deserialize)]
struct ModelFile {
    format: String,
    version: u32,
    config: AutoencoderConfig,
    image_size: Option<(usize, usize)>,
    /// Network record from burn's binary recorder.
    weights: Vec<u8>,
}

/// Dense autoencoder applied tile by tile.
pub struct BlockAutoencoder {
    config: AutoencoderConfig,
    network: Network<Train>,
    optimizer: OptimizerAdaptor<Adam, Network<Train>, Train>,
    device: NdArrayDevice,
    image_size: Option<(usize, usize)>,
}

impl fmt::Debug for BlockAutoencoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAutoencoder")
            .field("config", &self.config)
            .field("network", &self.network)
            .field("image_size", &self.image_size)
            .finish_non_exhaustive()
    }
}

impl BlockAutoencoder {
    /// Build a freshly initialized model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AutoencoderConfig) -> Result<Self> {
        config.validate()?;

        let device = NdArrayDevice::default();
        let mut rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let network =
            Network::<Train>::zeros(&config, &device).with_xavier(&config, &mut rng, &device);

        tracing::debug!(
            "Initialized block autoencoder: {0}x{0} blocks, {1}-d latent, {2} parameters",
            config.block,
            config.latent,
            network.num_params()
        );

        Ok(Self {
            optimizer: adam(),
            config,
            network,
            device,
            image_size: None,
        })
    }

    /// Load a model saved with [`Reconstructor::save`].
    ///
    /// Optimizer state is not persisted; it starts fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid model.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::ModelAccess {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ModelFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::ModelFormat {
                path: path.to_path_buf(),
                source,
            })?;

        if file.format != MODEL_FORMAT || file.version != MODEL_VERSION {
            return Err(Error::invalid(
                "model",
                format!(
                    "unsupported model file {} v{} (expected {MODEL_FORMAT} v{MODEL_VERSION})",
                    file.format, file.version
                ),
            ));
        }

        file.config.validate()?;

        let device = NdArrayDevice::default();
        let record: NetworkRecord<Train> = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(file.weights, &device)
            .map_err(|e| Error::ModelWeights {
                path: path.to_path_buf(),
                reason: format!("{e:?}"),
            })?;
        let network = Network::<Train>::zeros(&file.config, &device).load_record(record);
        network.check(&file.config)?;

        tracing::info!(
            "Loaded model from {} (trained on {:?})",
            path.display(),
            file.image_size
        );

        Ok(Self {
            optimizer: adam(),
            config: file.config,
            network,
            device,
            image_size: file.image_size,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    /// `(height, width)` of the images the model was trained on, if any.
    #[must_use]
    pub const fn trained_size(&self) -> Option<(usize, usize)> {
        self.image_size
    }

    fn blocks_of<B: Backend>(&self, batch: &ImageBatch, device: &B::Device) -> Result<Tensor<B, 2>> {
        let blocks = to_blocks(batch.view(), self.config.block)?;
        let (rows, cols) = blocks.dim();
        let values: Vec<f32> = blocks.iter().copied().collect();
        Ok(Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols]))
    }

    fn check_pair(inputs: &ImageBatch, targets: &ImageBatch) -> Result<()> {
        if inputs.dim() != targets.dim() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", inputs.shape()),
                actual: format!("{:?}", targets.shape()),
            });
        }
        if inputs.is_empty() {
            return Err(Error::EmptyDataset {
                reason: "batch has no pixels".to_string(),
            });
        }
        Ok(())
    }
}

impl Reconstructor for BlockAutoencoder {
    fn train_batch(&mut self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<f32> {
        Self::check_pair(inputs, targets)?;
        let size = batch_dims(inputs)?;

        let x = self.blocks_of::<Train>(inputs, &self.device)?;
        let target = self.blocks_of::<Train>(targets, &self.device)?;

        let output = self.network.forward(x);
        let loss = MseLoss::new().forward(output, target, Reduction::Mean);
        let value = scalar(loss.clone())?;

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        self.network = self.optimizer.step(
            f64::from(self.config.learning_rate),
            self.network.clone(),
            grads,
        );

        self.image_size = Some(size);
        Ok(value)
    }

    fn loss(&self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<f32> {
        Self::check_pair(inputs, targets)?;

        let x = self.blocks_of::<Valid>(inputs, &self.device)?;
        let target = self.blocks_of::<Valid>(targets, &self.device)?;
        let output = self.network.valid().forward(x);

        scalar(MseLoss::new().forward(output, target, Reduction::Mean))
    }

    fn predict(&self, inputs: &ImageBatch) -> Result<Array4<f32>> {
        let (height, width) = batch_dims(inputs)?;
        check_tiling(height, width, self.config.block)?;

        let count = inputs.len_of(Axis(0));
        if count == 0 {
            return Ok(inputs.clone());
        }

        let x = self.blocks_of::<Valid>(inputs, &self.device)?;
        let output = self.network.valid().forward(x);
        let [rows, cols] = output.dims();
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Tensor(format!("{e:?}")))?;
        let blocks =
            Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Tensor(e.to_string()))?;

        from_blocks(&blocks, count, height, width, self.config.block)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let access = |source: std::io::Error| Error::ModelAccess {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(access)?;
        }

        let weights = BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.network.valid().into_record(), ())
            .map_err(|e| Error::ModelWeights {
                path: path.to_path_buf(),
                reason: format!("{e:?}"),
            })?;

        let file = ModelFile {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            config: self.config.clone(),
            image_size: self.image_size,
            weights,
        };

        let writer = BufWriter::new(File::create(path).map_err(access)?);
        serde_json::to_writer(writer, &file).map_err(|source| Error::ModelFormat {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Saved model to {}", path.display());
        Ok(())
    }
}

/// Copy a single-element loss tensor back to the host.
fn scalar<B: Backend>(loss: Tensor<B, 1>) -> Result<f32> {
    loss.into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Tensor(format!("{e:?}")))?
        .first()
        .copied()
        .ok_or_else(|| Error::Tensor("loss tensor is empty".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(latent: usize, learning_rate: f32) -> BlockAutoencoder {
        BlockAutoencoder::new(AutoencoderConfig {
            block: 4,
            latent,
            learning_rate,
            seed: Some(7),
        })
        .unwrap()
    }

    fn stripes(count: usize) -> ImageBatch {
        Array4::from_shape_fn((count, 8, 8, 1), |(n, y, x, _)| {
            if (x + n) % 2 == 0 {
                0.8
            } else {
                0.2 + 0.05 * (y % 3) as f32
            }
        })
    }

    #[test]
    fn test_invalid_config() {
        let bad = AutoencoderConfig {
            latent: 0,
            ..AutoencoderConfig::default()
        };
        assert!(BlockAutoencoder::new(bad).is_err());

        let bad = AutoencoderConfig {
            learning_rate: f32::NAN,
            ..AutoencoderConfig::default()
        };
        assert!(BlockAutoencoder::new(bad).is_err());
    }

    #[test]
    fn test_seeded_models_match() {
        let batch = stripes(2);
        let a = seeded(6, 1e-3).predict(&batch).unwrap();
        let b = seeded(6, 1e-3).predict(&batch).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_shape_and_range() {
        let model = seeded(6, 1e-3);
        let out = model.predict(&stripes(3)).unwrap();

        assert_eq!(out.dim(), (3, 8, 8, 1));
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_predict_rejects_untileable() {
        let model = seeded(6, 1e-3);
        let batch = Array4::<f32>::zeros((1, 6, 8, 1));
        assert!(model.predict(&batch).is_err());
    }

    #[test]
    fn test_loss_matches_prediction_error() {
        let model = seeded(6, 1e-3);
        let inputs = stripes(2);
        let targets = inputs.mapv(|v| 1.0 - v);

        let predicted = model.predict(&inputs).unwrap();
        let expected = (&predicted - &targets).mapv(|d| d * d).mean().unwrap();
        let loss = model.loss(&inputs, &targets).unwrap();

        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut model = seeded(8, 1e-2);
        let targets = stripes(4);
        let inputs = targets.mapv(|v| (v + 0.05).min(1.0));

        let initial = model.loss(&inputs, &targets).unwrap();
        for _ in 0..200 {
            model.train_batch(&inputs, &targets).unwrap();
        }
        let trained = model.loss(&inputs, &targets).unwrap();

        assert!(trained < initial * 0.5, "{initial} -> {trained}");
        assert_eq!(model.trained_size(), Some((8, 8)));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let mut model = seeded(4, 1e-3);
        let err = model.train_batch(&stripes(2), &stripes(3)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_save_and_load_predict_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("ae.json");

        let mut model = seeded(5, 1e-2);
        let batch = stripes(2);
        model.train_batch(&batch, &batch).unwrap();
        model.save(&path).unwrap();

        let loaded = BlockAutoencoder::load(&path).unwrap();
        assert_eq!(loaded.config().block, 4);
        assert_eq!(loaded.trained_size(), Some((8, 8)));
        assert_eq!(loaded.predict(&batch).unwrap(), model.predict(&batch).unwrap());
    }

    #[test]
    fn test_load_rejects_foreign_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        fs::write(&path, r#"{"hello": "world"}"#).unwrap();

        assert!(matches!(
            BlockAutoencoder::load(&path),
            Err(Error::ModelFormat { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = BlockAutoencoder::load(&path).unwrap_err();
        assert!(matches!(err, Error::ModelAccess { .. }));
        assert!(err.to_string().contains("absent.json"), "{err}");
    }
}
