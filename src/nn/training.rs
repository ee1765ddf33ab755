use std::time::Instant;

use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
    },
};
use serde::Serialize;

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::nn::dataset::{SignalBatch, SignalBatcher, SignalDataset};
use crate::nn::model::{DilatedGruModel, DilatedGruModelConfig};

/// GPU training backend: Wgpu with autodiff
pub type GpuBackend = Autodiff<Wgpu>;

/// CPU training backend: NdArray with autodiff
pub type CpuBackend = Autodiff<NdArray>;

/// Outcome of observing one epoch's monitored loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monitor {
    Improved,
    Waiting,
    Stop,
}

/// Stops training once the monitored loss has not improved for `patience` epochs
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, loss: f64) -> Monitor {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return Monitor::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            Monitor::Stop
        } else {
            Monitor::Waiting
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// Per-epoch losses from one `fit` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    /// Epoch (0-based) whose weights were kept
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.train_losses.len()
    }
}

/// Binary cross-entropy on logits plus `l2_reg` times the dense-weight penalty.
///
/// Uses max(z, 0) - z*y + ln(1 + e^-|z|), the overflow-free form of
/// -y ln σ(z) - (1 - y) ln(1 - σ(z)).
pub fn bce_loss<B: Backend>(
    model: &DilatedGruModel<B>,
    inputs: Tensor<B, 3>,
    targets: Tensor<B, 2>,
    l2_reg: f64,
) -> Tensor<B, 1> {
    let logits = model.forward_logits(inputs);
    let stable = logits.clone().clamp_min(0.0) - logits.clone() * targets
        + logits.abs().neg().exp().add_scalar(1.0).log();
    let bce = stable.mean();
    if l2_reg > 0.0 {
        bce + model.l2_penalty().mul_scalar(l2_reg)
    } else {
        bce
    }
}

fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f64 {
    loss.into_scalar().elem::<f64>()
}

/// Mean loss over `dataset`, batch by batch, on a non-autodiff backend
fn evaluate_loss<B: Backend>(
    model: &DilatedGruModel<B>,
    dataset: &SignalDataset,
    batch_size: usize,
    l2_reg: f64,
    device: &B::Device,
) -> f64 {
    let batcher = SignalBatcher::<B>::new(device.clone());
    let mut total = 0.0;
    let mut count = 0_usize;
    for chunk in dataset.samples.chunks(batch_size.max(1)) {
        let SignalBatch { inputs, targets } = batcher.batch(chunk.to_vec());
        total += scalar(bce_loss(model, inputs, targets, l2_reg)) * chunk.len() as f64;
        count += chunk.len();
    }
    if count > 0 {
        total / count as f64
    } else {
        f64::NAN
    }
}

/// Hold out the last `validation_split` fraction in time order.
///
/// At least one window always stays in the training part.
pub fn holdout_split(dataset: &SignalDataset, validation_split: f64) -> (SignalDataset, SignalDataset) {
    let len = dataset.samples.len();
    let split_at = ((len as f64) * (1.0 - validation_split)) as usize;
    dataset.split_at(split_at.clamp(1, len.max(1)))
}

/// Train `model` on `dataset` with a trailing validation hold-out and early stopping.
///
/// The last `validation_split` fraction of the (time-ordered) dataset is held
/// out; training batches are shuffled each epoch. When the hold-out is empty
/// the training loss is monitored instead.
pub fn fit<B: AutodiffBackend>(
    model: DilatedGruModel<B>,
    dataset: &SignalDataset,
    config: &ExperimentConfig,
    device: &B::Device,
) -> Result<(DilatedGruModel<B>, TrainingHistory)> {
    if dataset.is_empty() {
        return Err(Error::EmptyInput("training set has no windows"));
    }

    let (train_set, val_set) = holdout_split(dataset, config.validation_split);

    tracing::debug!(
        "Training on {} windows, validating on {}",
        train_set.samples.len(),
        val_set.samples.len()
    );

    let batcher = SignalBatcher::<B>::new(device.clone());
    let dataloader = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .shuffle(config.shuffle_seed)
        .build(train_set);

    let mut model = model;
    let mut optim = AdamConfig::new().init();
    let mut stopping = EarlyStopping::new(config.patience);
    let mut best_model = model.clone();
    let mut history = TrainingHistory::default();

    for epoch in 0..config.epochs {
        let epoch_start = Instant::now();
        let mut epoch_loss = 0.0;
        let mut batch_count = 0;

        for batch in dataloader.iter() {
            let loss = bce_loss(&model, batch.inputs, batch.targets, config.l2_reg);
            let loss_scalar = scalar(loss.clone());

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(config.learning_rate, model, grads);

            epoch_loss += loss_scalar;
            batch_count += 1;
        }

        let train_loss = if batch_count > 0 {
            epoch_loss / batch_count as f64
        } else {
            f64::NAN
        };

        let val_loss = if val_set.is_empty() {
            train_loss
        } else {
            evaluate_loss(
                &model.valid(),
                &val_set,
                config.batch_size,
                config.l2_reg,
                device,
            )
        };

        history.train_losses.push(train_loss);
        history.val_losses.push(val_loss);

        tracing::debug!(
            "Epoch {}/{}: loss={:.4}, val_loss={:.4} ({} ms)",
            epoch + 1,
            config.epochs,
            train_loss,
            val_loss,
            epoch_start.elapsed().as_millis()
        );

        match stopping.observe(epoch, val_loss) {
            Monitor::Improved => best_model = model.clone(),
            Monitor::Waiting => {}
            Monitor::Stop => {
                tracing::debug!("Early stopping at epoch {}", epoch + 1);
                history.stopped_early = true;
                break;
            }
        }
    }

    history.best_epoch = stopping.best_epoch().unwrap_or(0);
    history.best_val_loss = stopping.best();

    if config.restore_best_weights && stopping.best_epoch().is_some() {
        model = best_model;
    }

    Ok((model, history))
}

/// Sigmoid probabilities for every window, in dataset order
pub fn predict<B: Backend>(
    model: &DilatedGruModel<B>,
    dataset: &SignalDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<f64>> {
    let batcher = SignalBatcher::<B>::new(device.clone());
    let mut probabilities = Vec::with_capacity(dataset.samples.len());

    for chunk in dataset.samples.chunks(batch_size.max(1)) {
        let batch = batcher.batch(chunk.to_vec());
        let output = model.forward(batch.inputs);
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
        probabilities.extend(values.into_iter().map(f64::from));
    }

    Ok(probabilities)
}

/// Build a fresh model, train it and return test-set probabilities.
pub fn train_and_predict<B: AutodiffBackend>(
    train_set: &SignalDataset,
    test_set: &SignalDataset,
    config: &ExperimentConfig,
    device: &B::Device,
) -> Result<(Vec<f64>, TrainingHistory)> {
    let model_config = DilatedGruModelConfig::from_experiment(
        train_set.seq_len(),
        train_set.num_features(),
        config,
    );
    let model = model_config.init::<B>(device);
    tracing::debug!("Initialized model with {} parameters", model.num_params());

    let (model, history) = fit(model, train_set, config, device)?;
    let probabilities = predict(&model.valid(), test_set, config.batch_size, device)?;
    Ok((probabilities, history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::random_windows;
    use crate::nn::CpuModel;
    use approx::assert_relative_eq;

    #[test]
    fn test_early_stopping_waits_for_patience() {
        let mut stopping = EarlyStopping::new(2);
        assert_eq!(stopping.observe(0, 1.0), Monitor::Improved);
        assert_eq!(stopping.observe(1, 1.0), Monitor::Waiting);
        assert_eq!(stopping.observe(2, 0.5), Monitor::Improved);
        assert_eq!(stopping.observe(3, 0.6), Monitor::Waiting);
        assert_eq!(stopping.observe(4, 0.7), Monitor::Stop);
        assert_eq!(stopping.best_epoch(), Some(2));
        assert_eq!(stopping.best(), 0.5);
    }

    #[test]
    fn test_bce_loss_matches_closed_form() {
        let device = Default::default();
        let model: CpuModel = DilatedGruModelConfig::new(4, 1)
            .with_gru_units(2)
            .with_dense_units(vec![2])
            .init(&device);
        let inputs = Tensor::<NdArray, 3>::zeros([2, 4, 1], &device);
        let targets = Tensor::<NdArray, 1>::from_floats([1.0, 0.0], &device).reshape([2, 1]);

        let probs = model
            .forward(inputs.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let expected = -((probs[0] as f64).ln() + (1.0 - probs[1] as f64).ln()) / 2.0;
        let loss = scalar(bce_loss(&model, inputs, targets, 0.0));
        assert!((loss - expected).abs() < 1e-4, "loss {} expected {}", loss, expected);
    }

    #[test]
    fn test_fit_runs_and_records_history() {
        let device = Default::default();
        let dataset = random_windows(60, 8, 3, 7);
        let config = ExperimentConfig::new()
            .with_epochs(3)
            .with_gru_units(4)
            .with_dense_units(vec![4]);
        let model = DilatedGruModelConfig::from_experiment(8, 3, &config).init::<CpuBackend>(&device);

        let (_, history) = fit(model, &dataset, &config, &device).unwrap();
        assert!(history.epochs_run() >= 1 && history.epochs_run() <= 3);
        assert_eq!(history.train_losses.len(), history.val_losses.len());
        assert!(history.val_losses.iter().all(|l| l.is_finite()));
        assert!(history.best_epoch < history.epochs_run());
    }

    #[test]
    fn test_holdout_is_trailing_and_ordered() {
        let dataset = random_windows(10, 2, 1, 5);
        let (train, val) = holdout_split(&dataset, 0.2);
        assert_eq!(train.samples, dataset.samples[..8].to_vec());
        assert_eq!(val.samples, dataset.samples[8..].to_vec());

        let (train, val) = holdout_split(&dataset, 0.0);
        assert_eq!(train.samples.len(), 10);
        assert!(val.is_empty());
    }

    #[test]
    fn test_fit_restores_best_validation_weights() {
        let device = Default::default();
        let dataset = random_windows(60, 8, 3, 11);
        let config = ExperimentConfig::new()
            .with_epochs(6)
            .with_gru_units(4)
            .with_dense_units(vec![4])
            .with_learning_rate(0.05);
        let model = DilatedGruModelConfig::from_experiment(8, 3, &config).init::<CpuBackend>(&device);

        let (model, history) = fit(model, &dataset, &config, &device).unwrap();
        let (_, val) = holdout_split(&dataset, config.validation_split);
        let restored = evaluate_loss(&model.valid(), &val, config.batch_size, config.l2_reg, &device);

        assert_relative_eq!(restored, history.best_val_loss, epsilon = 1e-6);
        assert_relative_eq!(history.val_losses[history.best_epoch], history.best_val_loss);
        assert!(history.val_losses.iter().all(|&l| l >= history.best_val_loss));
    }

    #[test]
    fn test_fit_stops_when_validation_loss_plateaus() {
        let device = Default::default();
        let dataset = random_windows(40, 4, 2, 9);
        // a zero step size leaves the weights, and so the validation loss, unchanged
        let config = ExperimentConfig::new()
            .with_epochs(10)
            .with_patience(2)
            .with_gru_units(4)
            .with_dense_units(vec![4])
            .with_learning_rate(0.0);
        let model = DilatedGruModelConfig::from_experiment(4, 2, &config).init::<CpuBackend>(&device);

        let (_, history) = fit(model, &dataset, &config, &device).unwrap();
        assert!(history.stopped_early);
        assert_eq!(history.epochs_run(), 3);
        assert_eq!(history.best_epoch, 0);
    }

    #[test]
    fn test_train_and_predict_returns_probabilities() {
        let device = Default::default();
        let dataset = random_windows(40, 6, 2, 3);
        let (train, test) = dataset.split_at(30);
        let config = ExperimentConfig::new()
            .with_epochs(2)
            .with_gru_units(4)
            .with_dense_units(vec![4]);

        let (probs, _) = train_and_predict::<CpuBackend>(&train, &test, &config, &device).unwrap();
        assert_eq!(probs.len(), 10);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_fit_rejects_empty_dataset() {
        let device = Default::default();
        let config = ExperimentConfig::new();
        let model = DilatedGruModelConfig::new(4, 1).init::<CpuBackend>(&device);
        assert!(matches!(
            fit(model, &SignalDataset::default(), &config, &device),
            Err(Error::EmptyInput(_))
        ));
    }
}
