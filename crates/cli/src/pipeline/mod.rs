//! Pipeline orchestration module.

mod runner;
mod stats;

pub use runner::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
