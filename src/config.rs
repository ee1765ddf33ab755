use std::path::Path;

use burn::config::Config;

use crate::error::Error;

/// Label column in the price table (1 = buy, 0 = sell)
pub const LABEL_COLUMN: &str = "signal";

/// Sentiment event columns
pub const DATE_COLUMN: &str = "Date";
pub const SENTIMENT_COLUMN: &str = "Sentiment";
pub const SENTIMENT_SCORE_COLUMN: &str = "Sentiment_Score";
pub const WEIGHTED_SENTIMENT_COLUMN: &str = "Weighted_Sentiment_Exp";

/// Highest sentiment label; labels run 0..=MAX_SENTIMENT_LABEL
pub const MAX_SENTIMENT_LABEL: u8 = 2;

/// Demonstration run over synthetic data
pub const DEMO_SEQ_LENS: &[usize] = &[14, 28];
pub const DEMO_NUM_SAMPLES: usize = 1000;
pub const DEMO_NUM_FEATURES: usize = 10;
pub const DEMO_SEED: u64 = 42;

/// Hyper-parameters for one evaluation run.
///
/// Sequence length is not part of the config; it is a property of the
/// windowed dataset handed to the evaluator.
#[derive(Config, Debug)]
pub struct ExperimentConfig {
    /// Hidden width of every GRU branch
    #[config(default = 64)]
    pub gru_units: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
    /// L2 penalty on the dense kernels
    #[config(default = 0.01)]
    pub l2_reg: f64,
    /// One branch per entry; each subsamples the window with that stride
    #[config(default = "vec![1, 2, 4]")]
    pub dilation_rates: Vec<usize>,
    #[config(default = "vec![64, 64]")]
    pub dense_units: Vec<usize>,
    #[config(default = 30)]
    pub epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    /// Trailing fraction of each training portion held out for validation
    #[config(default = 0.2)]
    pub validation_split: f64,
    /// Epochs without validation improvement before stopping
    #[config(default = 5)]
    pub patience: usize,
    #[config(default = true)]
    pub restore_best_weights: bool,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Number of expanding-window folds
    #[config(default = 3)]
    pub n_splits: usize,
    /// Probability above which a prediction counts as "buy"
    #[config(default = 0.5)]
    pub threshold: f64,
    /// Points on the common false-positive-rate grid
    #[config(default = 100)]
    pub roc_points: usize,
    #[config(default = 42)]
    pub shuffle_seed: u64,
}

impl ExperimentConfig {
    /// Largest dilation rate, i.e. the minimum usable sequence length.
    pub fn max_dilation(&self) -> usize {
        self.dilation_rates.iter().copied().max().unwrap_or(1)
    }

    /// Dilation rates must be non-empty and strictly positive.
    pub fn check_dilations(&self) -> crate::error::Result<()> {
        if self.dilation_rates.is_empty() || self.dilation_rates.contains(&0) {
            return Err(Error::InvalidDilations(self.dilation_rates.clone()));
        }
        Ok(())
    }

    /// Load a JSON object of overrides; fields it leaves out keep their defaults.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let config_error = |e: &dyn std::fmt::Display| Error::Config(format!("{}: {}", path.display(), e));

        let text = std::fs::read_to_string(path)?;
        let overrides: serde_json::Value = serde_json::from_str(&text).map_err(|e| config_error(&e))?;
        let serde_json::Value::Object(overrides) = overrides else {
            return Err(config_error(&"expected a JSON object"));
        };

        let mut merged = serde_json::to_value(Self::new()).map_err(|e| config_error(&e))?;
        if let serde_json::Value::Object(base) = &mut merged {
            base.extend(overrides);
        }

        let config = Self::load_binary(merged.to_string().as_bytes()).map_err(|e| config_error(&e))?;
        config.check_dilations()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hyperparameters() {
        let config = ExperimentConfig::new();
        assert_eq!(config.gru_units, 64);
        assert_eq!(config.dilation_rates, vec![1, 2, 4]);
        assert_eq!(config.dense_units, vec![64, 64]);
        assert_eq!(config.epochs, 30);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.patience, 5);
        assert_eq!(config.n_splits, 3);
        assert_eq!(config.roc_points, 100);
        assert_eq!(config.max_dilation(), 4);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ExperimentConfig::new().with_epochs(2).with_dilation_rates(vec![1, 3]);
        assert_eq!(config.epochs, 2);
        assert_eq!(config.max_dilation(), 3);
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_from_file_merges_partial_overrides() {
        let path = write_temp("signal_gru_partial_config.json", r#"{"epochs": 3, "dilation_rates": [1, 2]}"#);

        let config = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.dilation_rates, vec![1, 2]);
        assert_eq!(config.gru_units, 64);
        assert_eq!(config.patience, 5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_file_reads_saved_config() {
        let path = std::env::temp_dir().join("signal_gru_saved_config.json");
        ExperimentConfig::new().with_batch_size(8).save(&path).unwrap();

        let config = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.dense_units, vec![64, 64]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_file_rejects_unusable_dilations() {
        let empty = write_temp("signal_gru_empty_dilations.json", r#"{"dilation_rates": []}"#);
        assert!(matches!(
            ExperimentConfig::from_file(&empty),
            Err(Error::InvalidDilations(rates)) if rates.is_empty()
        ));
        std::fs::remove_file(&empty).ok();

        let zero = write_temp("signal_gru_zero_dilation.json", r#"{"dilation_rates": [1, 0]}"#);
        assert!(matches!(ExperimentConfig::from_file(&zero), Err(Error::InvalidDilations(_))));
        std::fs::remove_file(&zero).ok();
    }

    #[test]
    fn test_check_dilations() {
        assert!(ExperimentConfig::new().check_dilations().is_ok());
        assert!(ExperimentConfig::new().with_dilation_rates(vec![]).check_dilations().is_err());
        assert!(ExperimentConfig::new().with_dilation_rates(vec![0, 2]).check_dilations().is_err());
    }

    #[test]
    fn test_from_file_rejects_bad_json() {
        let path = write_temp("signal_gru_bad_config.json", "{ not json");
        assert!(matches!(ExperimentConfig::from_file(&path), Err(Error::Config(_))));
        std::fs::remove_file(&path).ok();

        let path = write_temp("signal_gru_array_config.json", "[1, 2]");
        assert!(matches!(ExperimentConfig::from_file(&path), Err(Error::Config(_))));
        std::fs::remove_file(&path).ok();
    }
}
