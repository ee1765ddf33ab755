//! Error types for the signal pipeline.

use thiserror::Error;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for loading, preparing and evaluating signal data.
#[derive(Debug, Error)]
pub enum Error {
    /// A required column is absent from a table header.
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// A CSV row could not be parsed.
    #[error("Malformed row at line {line}: {message}")]
    MalformedRow {
        /// 1-based line number in the source text
        line: usize,
        /// What was wrong with the row
        message: String,
    },

    /// Sentiment labels must be 0, 1 or 2.
    #[error("Invalid sentiment label {value} at line {line}, expected 0, 1 or 2")]
    InvalidSentiment {
        /// 1-based line number in the source text
        line: usize,
        /// The offending label
        value: i64,
    },

    /// Signal labels must be 0 or 1.
    #[error("Invalid label {value} at row {row}, expected 0 or 1")]
    InvalidLabel {
        /// Row index in the feature table
        row: usize,
        /// The offending value
        value: f64,
    },

    /// An operation received no rows.
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Not enough samples to form the requested folds.
    #[error("Cannot split {samples} samples into {splits} folds")]
    TooFewSamples {
        /// Number of available samples
        samples: usize,
        /// Requested number of folds
        splits: usize,
    },

    /// The window is shorter than the largest dilation rate.
    #[error("Sequence length {seq_len} must be >= {min} to support dilations {dilations:?}")]
    SequenceTooShort {
        /// Window length
        seq_len: usize,
        /// Minimum supported window length
        min: usize,
        /// Configured dilation rates
        dilations: Vec<usize>,
    },

    /// Dilation rates must be non-empty and positive.
    #[error("Invalid dilation rates {0:?}, expected a non-empty list of positive strides")]
    InvalidDilations(Vec<usize>),

    /// Two inputs disagree on a dimension.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape
        expected: Vec<usize>,
        /// The actual shape
        actual: Vec<usize>,
    },

    /// Reading values back from a tensor failed.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Loading an experiment config failed.
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
