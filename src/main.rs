//! `jpegrestore` CLI - JPEG + autoencoder hybrid compression experiment.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jpegrestore::image::JpegQuality;
use jpegrestore::model::{AutoencoderConfig, BlockAutoencoder};
use jpegrestore::pipeline::{
    self, EvalConfig, PreprocessConfig, TrainConfig, DEFAULT_IMAGES_PATH, DEFAULT_MODEL_PATH,
};
use jpegrestore::report::ComparisonChart;

/// Train an autoencoder to restore JPEG-compressed grayscale images.
#[derive(Parser, Debug)]
#[command(name = "jpegrestore")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a directory of images into a normalized grayscale array file.
    Preprocess(PreprocessArgs),
    /// Train the autoencoder on JPEG-degraded copies of the array.
    Train(TrainArgs),
    /// Run the trained model and save a degraded/reconstructed/original grid.
    Evaluate(EvaluateArgs),
    /// Render the method comparison bar chart.
    Plot(PlotArgs),
}

#[derive(ClapArgs, Debug)]
struct PreprocessArgs {
    /// Directory containing .jpg/.png images.
    #[arg(long, default_value = "./data/", value_name = "DIR")]
    data_dir: PathBuf,

    /// Output array file.
    #[arg(short, long, default_value = DEFAULT_IMAGES_PATH, value_name = "FILE")]
    output: PathBuf,

    /// Target width in pixels.
    #[arg(long, default_value = "256", value_name = "INT")]
    width: u32,

    /// Target height in pixels.
    #[arg(long, default_value = "256", value_name = "INT")]
    height: u32,

    /// Maximum number of images to load.
    #[arg(long, default_value = "1000", value_name = "INT")]
    limit: usize,
}

#[derive(ClapArgs, Debug)]
struct TrainArgs {
    /// Input array file.
    #[arg(long, default_value = DEFAULT_IMAGES_PATH, value_name = "FILE")]
    images: PathBuf,

    /// Where to save the trained model.
    #[arg(long, default_value = DEFAULT_MODEL_PATH, value_name = "FILE")]
    model: PathBuf,

    /// Number of training epochs.
    #[arg(long, default_value = "50", value_name = "INT")]
    epochs: usize,

    /// Images per batch.
    #[arg(long, default_value = "32", value_name = "INT")]
    batch_size: usize,

    /// Fraction of samples held out for validation (0.0-1.0).
    #[arg(long, default_value = "0.1", value_name = "FLOAT")]
    validation_split: f64,

    /// JPEG quality used to degrade inputs (1-100).
    #[arg(short, long, default_value = "30", value_name = "INT")]
    quality: u8,

    /// Block size of the autoencoder, in pixels.
    #[arg(long, default_value = "8", value_name = "INT")]
    block: usize,

    /// Latent code size per block.
    #[arg(long, default_value = "32", value_name = "INT")]
    latent: usize,

    /// Adam learning rate.
    #[arg(long, default_value = "0.001", value_name = "FLOAT")]
    learning_rate: f32,

    /// Keep sample order fixed across epochs.
    #[arg(long)]
    no_shuffle: bool,

    /// Random seed for reproducibility.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct EvaluateArgs {
    /// Input array file.
    #[arg(long, default_value = DEFAULT_IMAGES_PATH, value_name = "FILE")]
    images: PathBuf,

    /// Trained model file.
    #[arg(long, default_value = DEFAULT_MODEL_PATH, value_name = "FILE")]
    model: PathBuf,

    /// Output path for the comparison grid.
    #[arg(short, long, default_value = "evaluation.png", value_name = "FILE")]
    output: PathBuf,

    /// Number of images shown in the grid.
    #[arg(long, default_value = "5", value_name = "INT")]
    samples: usize,

    /// JPEG quality used to degrade inputs (1-100).
    #[arg(short, long, default_value = "30", value_name = "INT")]
    quality: u8,

    /// Feed the stored images to the model without JPEG degradation.
    #[arg(long)]
    raw_inputs: bool,
}

#[derive(ClapArgs, Debug)]
struct PlotArgs {
    /// Output path for the chart.
    #[arg(short, long, default_value = "comparison.png", value_name = "FILE")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("jpegrestore={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Preprocess(cmd) => run_preprocess(cmd),
        Command::Train(cmd) => run_train(cmd),
        Command::Evaluate(cmd) => run_evaluate(cmd),
        Command::Plot(cmd) => run_plot(cmd),
    }
}

fn run_preprocess(cmd: &PreprocessArgs) -> Result<()> {
    let config = PreprocessConfig {
        data_dir: cmd.data_dir.clone(),
        output: cmd.output.clone(),
        width: cmd.width,
        height: cmd.height,
        limit: cmd.limit,
    };

    let report = pipeline::preprocess(&config).context("Failed to preprocess images")?;

    println!(
        "Saved {} images with shape {:?} to {}",
        report.loaded.len(),
        report.images.shape(),
        config.output.display()
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    Ok(())
}

fn run_train(cmd: &TrainArgs) -> Result<()> {
    let config = TrainConfig {
        images: cmd.images.clone(),
        model: cmd.model.clone(),
        epochs: cmd.epochs,
        batch_size: cmd.batch_size,
        validation_split: cmd.validation_split,
        shuffle: !cmd.no_shuffle,
        quality: JpegQuality::new(cmd.quality)?,
        seed: cmd.seed,
    };

    let mut model = BlockAutoencoder::new(AutoencoderConfig {
        block: cmd.block,
        latent: cmd.latent,
        learning_rate: cmd.learning_rate,
        seed: cmd.seed,
    })
    .context("Failed to build model")?;

    let report = pipeline::train(&mut model, &config).context("Failed to train model")?;

    if let Some(last) = report.last() {
        match last.val_loss {
            Some(val) => println!(
                "Trained {} epochs: loss {:.6}, val_loss {val:.6}",
                last.epoch, last.train_loss
            ),
            None => println!("Trained {} epochs: loss {:.6}", last.epoch, last.train_loss),
        }
    }
    println!("Saved model to {}", config.model.display());

    Ok(())
}

fn run_evaluate(cmd: &EvaluateArgs) -> Result<()> {
    let config = EvalConfig {
        images: cmd.images.clone(),
        model: cmd.model.clone(),
        output: cmd.output.clone(),
        samples: cmd.samples,
        quality: JpegQuality::new(cmd.quality)?,
        degrade_inputs: !cmd.raw_inputs,
        ..EvalConfig::default()
    };

    let report = pipeline::evaluate(&config).context("Failed to evaluate model")?;

    println!("Evaluated {} images", report.images);
    println!(
        "  input:         PSNR {:>6.2} dB  SSIM {:.4}",
        report.input_quality.psnr, report.input_quality.ssim
    );
    println!(
        "  reconstructed: PSNR {:>6.2} dB  SSIM {:.4}",
        report.reconstructed_quality.psnr, report.reconstructed_quality.ssim
    );
    if let Some(ratio) = report.compression_ratio {
        println!("  JPEG compression ratio {ratio:.2}");
    }
    println!("Saved comparison grid to {}", report.grid.display());

    Ok(())
}

fn run_plot(cmd: &PlotArgs) -> Result<()> {
    let chart = ComparisonChart::default();
    chart
        .save(&cmd.output)
        .with_context(|| format!("Failed to save chart to {}", cmd.output.display()))?;

    print!("{}", chart.table());
    println!("Saved chart to {}", cmd.output.display());

    Ok(())
}
