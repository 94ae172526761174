//! Preprocess, train and evaluate stages.
//!
//! Stages share nothing in memory; they hand data over through the image
//! array file and the model file named in their configs.

mod config;
mod evaluate;
mod preprocess;
mod train;

pub use config::{
    EvalConfig, PreprocessConfig, TrainConfig, DEFAULT_IMAGES_PATH, DEFAULT_MODEL_PATH,
};
pub use evaluate::{evaluate, evaluate_model, render_grid, EvalReport, GRID_ROWS};
pub use preprocess::preprocess;
pub use train::{fit, train, EpochStats, TrainReport};
