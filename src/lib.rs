//! # jpegrestore
//!
//! Hybrid image compression experiment: images are lossy-compressed with JPEG
//! and a small autoencoder learns to restore the originals from the
//! compressed versions.
//!
//! The stages only share files: preprocessing writes a `(N, H, W, 1)` array,
//! training reads it and writes a model, evaluation reads both.
//!
//! ## Example
//!
//! ```no_run
//! use jpegrestore::model::{AutoencoderConfig, BlockAutoencoder};
//! use jpegrestore::pipeline::{self, EvalConfig, PreprocessConfig, TrainConfig};
//!
//! # fn main() -> jpegrestore::Result<()> {
//! pipeline::preprocess(&PreprocessConfig::default())?;
//!
//! let mut model = BlockAutoencoder::new(AutoencoderConfig::default())?;
//! pipeline::train(&mut model, &TrainConfig::default())?;
//!
//! let report = pipeline::evaluate(&EvalConfig::default())?;
//! println!("PSNR {:.2} dB", report.reconstructed_quality.psnr);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;

pub use error::{Error, Result};
pub use model::{BlockAutoencoder, Reconstructor};
