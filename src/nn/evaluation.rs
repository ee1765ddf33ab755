use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::Serialize;

use crate::analysis::metrics::{self, ClassificationMetrics, ConfusionMatrix};
use crate::analysis::split::{expanding_window_splits, FoldSplit};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::nn::dataset::SignalDataset;
use crate::nn::training::{self, CpuBackend, GpuBackend, TrainingHistory};

/// Scores for one cross-validation fold
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    /// 1-based
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
    /// NaN when the test set holds a single class
    pub auc: f64,
    /// TPR sampled on the report's common FPR grid
    pub interpolated_tpr: Vec<f64>,
    pub epochs_run: usize,
    pub best_val_loss: f64,
}

/// Per-fold results plus the mean ROC curve across folds
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub seq_len: usize,
    pub num_features: usize,
    pub folds: Vec<FoldResult>,
    /// Evenly spaced over [0, 1], shared by every fold
    pub mean_fpr: Vec<f64>,
    /// Elementwise mean of the folds' interpolated TPR
    pub mean_tpr: Vec<f64>,
    /// Area under the mean curve
    pub mean_auc: f64,
    /// Spread of the per-fold AUC values
    pub auc_std: f64,
}

impl EvaluationReport {
    pub fn fold_aucs(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.auc).collect()
    }
}

/// Score one fold's probabilities against its labels
pub fn score_fold(
    fold: usize,
    split: &FoldSplit,
    y_true: &[u8],
    probabilities: &[f64],
    history: &TrainingHistory,
    mean_fpr: &[f64],
    threshold: f64,
) -> FoldResult {
    let y_pred = metrics::threshold_predictions(probabilities, threshold);
    let confusion = ConfusionMatrix::from_predictions(y_true, &y_pred);
    let scores = ClassificationMetrics::from_confusion(&confusion);

    if confusion.actual_negatives() == 0 {
        tracing::warn!("Fold {} has no negative samples; specificity is undefined", fold);
    }

    let (auc, interpolated_tpr) = match metrics::roc_curve(y_true, probabilities) {
        Some(roc) => (roc.auc(), metrics::interp(mean_fpr, &roc.fpr, &roc.tpr)),
        None => {
            tracing::warn!("Fold {} has a single class; ROC is undefined", fold);
            (f64::NAN, vec![f64::NAN; mean_fpr.len()])
        }
    };

    FoldResult {
        fold,
        train_size: split.train.len(),
        test_size: split.test.len(),
        confusion,
        metrics: scores,
        auc,
        interpolated_tpr,
        epochs_run: history.epochs_run(),
        best_val_loss: history.best_val_loss,
    }
}

fn log_fold(result: &FoldResult) {
    let m = &result.metrics;
    tracing::info!(
        "Fold {} - Accuracy: {:.4}, F1: {:.4}, Recall: {:.4}, Precision: {:.4}, Specificity: {:.4}, AUC: {:.4}",
        result.fold,
        m.accuracy,
        m.f1,
        m.recall,
        m.precision,
        m.specificity,
        result.auc
    );
    tracing::info!("Confusion Matrix - Fold {}\n{}", result.fold, result.confusion.display());
}

/// Combine fold results into the mean ROC report
pub fn summarize(seq_len: usize, num_features: usize, folds: Vec<FoldResult>, mean_fpr: Vec<f64>) -> EvaluationReport {
    let curves: Vec<Vec<f64>> = folds.iter().map(|f| f.interpolated_tpr.clone()).collect();
    let mean_tpr = metrics::mean_curve(&curves);
    let mean_auc = metrics::auc(&mean_fpr, &mean_tpr);
    let aucs: Vec<f64> = folds.iter().map(|f| f.auc).collect();
    let (_, auc_std) = metrics::mean_std(&aucs);

    EvaluationReport {
        seq_len,
        num_features,
        folds,
        mean_fpr,
        mean_tpr,
        mean_auc,
        auc_std,
    }
}

fn validate(dataset: &SignalDataset, config: &ExperimentConfig) -> Result<()> {
    config.check_dilations()?;
    let seq_len = dataset.seq_len();
    if dataset.is_empty() {
        return Err(Error::EmptyInput("no windows to evaluate"));
    }
    if seq_len < config.max_dilation() {
        return Err(Error::SequenceTooShort {
            seq_len,
            min: config.max_dilation(),
            dilations: config.dilation_rates.clone(),
        });
    }
    Ok(())
}

/// Expanding-window cross-validation with a fresh model per fold.
///
/// Folds run in time order; a training failure in any fold aborts the run.
pub fn evaluate<B: AutodiffBackend>(
    dataset: &SignalDataset,
    config: &ExperimentConfig,
    device: &B::Device,
) -> Result<EvaluationReport> {
    validate(dataset, config)?;
    let seq_len = dataset.seq_len();
    let num_features = dataset.num_features();

    let splits = expanding_window_splits(dataset.samples.len(), config.n_splits)?;
    let mean_fpr = metrics::linspace(0.0, 1.0, config.roc_points);
    let mut folds = Vec::with_capacity(splits.len());

    tracing::info!(
        "Evaluating dilated GRU on {} windows ({}-step, {} features) over {} folds",
        dataset.samples.len(),
        seq_len,
        num_features,
        splits.len()
    );

    for (i, split) in splits.iter().enumerate() {
        let fold = i + 1;
        let train_set = dataset.subset(split.train.clone());
        let test_set = dataset.subset(split.test.clone());

        let (probabilities, history) =
            training::train_and_predict::<B>(&train_set, &test_set, config, device)?;
        tracing::debug!(
            "Fold {} trained for {} epochs (best val_loss {:.4})",
            fold,
            history.epochs_run(),
            history.best_val_loss
        );

        let result = score_fold(
            fold,
            split,
            &test_set.labels(),
            &probabilities,
            &history,
            &mean_fpr,
            config.threshold,
        );
        log_fold(&result);
        folds.push(result);
    }

    let report = summarize(seq_len, num_features, folds, mean_fpr);
    tracing::info!(
        "Mean ROC (AUC = {:.4}), fold AUC std {:.4}",
        report.mean_auc,
        report.auc_std
    );
    Ok(report)
}

/// Run `evaluate` on the GPU (Wgpu) or CPU (NdArray) backend.
pub fn run_evaluation(dataset: &SignalDataset, config: &ExperimentConfig, use_gpu: bool) -> Result<EvaluationReport> {
    if use_gpu {
        tracing::info!("Starting evaluation with Wgpu backend");
        let device = <burn::backend::Wgpu as Backend>::Device::default();
        evaluate::<GpuBackend>(dataset, config, &device)
    } else {
        tracing::info!("Starting evaluation with NdArray backend");
        let device = <burn::backend::NdArray as Backend>::Device::default();
        evaluate::<CpuBackend>(dataset, config, &device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::random_windows;
    use approx::assert_relative_eq;

    fn history() -> TrainingHistory {
        TrainingHistory {
            train_losses: vec![0.7, 0.6],
            val_losses: vec![0.69, 0.68],
            best_epoch: 1,
            best_val_loss: 0.68,
            stopped_early: false,
        }
    }

    #[test]
    fn test_score_fold_metrics_and_grid() {
        let split = FoldSplit { train: 0..4, test: 4..8 };
        let mean_fpr = metrics::linspace(0.0, 1.0, 100);
        let result = score_fold(
            2,
            &split,
            &[0, 0, 1, 1],
            &[0.1, 0.4, 0.35, 0.8],
            &history(),
            &mean_fpr,
            0.5,
        );

        assert_eq!(result.fold, 2);
        assert_eq!(result.test_size, 4);
        assert_eq!(result.confusion, ConfusionMatrix { tn: 2, fp: 0, fn_: 1, tp: 1 });
        assert_relative_eq!(result.metrics.specificity, 1.0);
        assert_relative_eq!(result.auc, 0.75);
        assert_eq!(result.interpolated_tpr.len(), 100);
        assert_relative_eq!(*result.interpolated_tpr.last().unwrap(), 1.0);
        assert_eq!(result.epochs_run, 2);
    }

    #[test]
    fn test_single_class_fold_is_nan_not_error() {
        let split = FoldSplit { train: 0..3, test: 3..6 };
        let mean_fpr = metrics::linspace(0.0, 1.0, 10);
        let result = score_fold(1, &split, &[1, 1, 1], &[0.2, 0.7, 0.9], &history(), &mean_fpr, 0.5);
        assert!(result.auc.is_nan());
        assert!(result.metrics.specificity.is_nan());
        assert!(result.interpolated_tpr.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_summary_mean_curve() {
        let mean_fpr = metrics::linspace(0.0, 1.0, 3);
        let split = FoldSplit { train: 0..1, test: 1..2 };
        let mut a = score_fold(1, &split, &[0, 1], &[0.2, 0.8], &history(), &mean_fpr, 0.5);
        let mut b = a.clone();
        a.interpolated_tpr = vec![0.0, 0.5, 1.0];
        b.interpolated_tpr = vec![0.5, 1.0, 1.0];
        b.fold = 2;
        b.auc = 0.5;

        let report = summarize(14, 10, vec![a, b], mean_fpr);
        assert_eq!(report.mean_tpr, vec![0.25, 0.75, 1.0]);
        assert_relative_eq!(report.mean_auc, 0.25 * (0.25 + 0.75) + 0.25 * (0.75 + 1.0));
        assert_relative_eq!(report.auc_std, 0.25);
        assert_eq!(report.fold_aucs(), vec![1.0, 0.5]);
    }

    #[test]
    fn test_short_sequence_rejected_before_training() {
        let dataset = random_windows(20, 3, 2, 1);
        let config = ExperimentConfig::new();
        assert!(matches!(
            run_evaluation(&dataset, &config, false),
            Err(Error::SequenceTooShort { seq_len: 3, min: 4, .. })
        ));
    }

    #[test]
    fn test_unusable_dilations_return_error() {
        let dataset = random_windows(20, 4, 2, 1);
        for rates in [vec![], vec![0], vec![2, 0]] {
            let config = ExperimentConfig::new().with_dilation_rates(rates);
            assert!(matches!(
                run_evaluation(&dataset, &config, false),
                Err(Error::InvalidDilations(_))
            ));
        }
    }

    #[test]
    fn test_evaluate_small_run() {
        let dataset = random_windows(80, 8, 3, 42);
        let config = ExperimentConfig::new()
            .with_epochs(2)
            .with_gru_units(4)
            .with_dense_units(vec![4, 4]);
        let report = run_evaluation(&dataset, &config, false).unwrap();

        assert_eq!(report.folds.len(), 3);
        assert_eq!(report.mean_fpr.len(), 100);
        assert_eq!(report.mean_tpr.len(), 100);
        for (i, fold) in report.folds.iter().enumerate() {
            assert_eq!(fold.fold, i + 1);
            assert_eq!(fold.test_size, 20);
            assert_eq!(fold.train_size, 20 * (i + 1));
        }
    }
}
