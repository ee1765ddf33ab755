//! Dilated GRU ensemble for daily buy/sell signals.
//!
//! Sentiment events are aggregated per day and joined onto a price table,
//! standardized, windowed, and scored with expanding-window
//! cross-validation.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod nn;

pub use config::ExperimentConfig;
pub use error::{Error, Result};
pub use nn::dataset::{prepare_features, SignalDataset};
pub use nn::evaluation::{evaluate, run_evaluation, EvaluationReport};
