//! Report figures.

mod chart;

pub use chart::{reference_scores, Bar, ComparisonChart, MethodScores, BAR_WIDTH, METRICS};
