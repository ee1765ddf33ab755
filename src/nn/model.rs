use burn::{
    module::Module,
    nn::{
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{activation, backend::Backend, Int, Tensor},
};

use crate::config::ExperimentConfig;

/// One recurrent branch: every `dilation`-th step -> GRU -> mean over time -> dropout
#[derive(Module, Debug)]
pub struct GruBranch<B: Backend> {
    gru: Gru<B>,
    dropout: Dropout,
    dilation: usize,
}

impl<B: Backend> GruBranch<B> {
    /// Input shape: [batch_size, seq_len, num_features]
    /// Output shape: [batch_size, units]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [_, seq_len, _] = input.dims();
        let steps = Tensor::<B, 1, Int>::arange_step(0..seq_len as i64, self.dilation, &input.device());
        let strided = input.select(1, steps);

        // [batch_size, ceil(seq_len / dilation), units]
        let hidden = self.gru.forward(strided, None);
        let pooled = hidden.mean_dim(1).squeeze::<2>(1);

        self.dropout.forward(pooled)
    }

    pub fn dilation(&self) -> usize {
        self.dilation
    }
}

/// Parallel dilated GRU branches feeding a regularized dense head
///
/// Architecture: branches (concat) -> [Linear -> ReLU -> Dropout] x N -> Linear -> sigmoid
#[derive(Module, Debug)]
pub struct DilatedGruModel<B: Backend> {
    branches: Vec<GruBranch<B>>,
    dense: Vec<Linear<B>>,
    dense_dropout: Dropout,
    activation: Relu,
    output_layer: Linear<B>,
}

/// Configuration for the model
#[derive(burn::config::Config, Debug)]
pub struct DilatedGruModelConfig {
    pub seq_len: usize,
    pub num_features: usize,
    #[config(default = 64)]
    pub gru_units: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
    #[config(default = "vec![1, 2, 4]")]
    pub dilation_rates: Vec<usize>,
    #[config(default = "vec![64, 64]")]
    pub dense_units: Vec<usize>,
}

impl DilatedGruModelConfig {
    pub fn from_experiment(seq_len: usize, num_features: usize, experiment: &ExperimentConfig) -> Self {
        Self::new(seq_len, num_features)
            .with_gru_units(experiment.gru_units)
            .with_dropout(experiment.dropout)
            .with_dilation_rates(experiment.dilation_rates.clone())
            .with_dense_units(experiment.dense_units.clone())
    }

    /// Panics if the window is shorter than the largest dilation rate, or if
    /// any rate is zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DilatedGruModel<B> {
        let max_dilation = self.dilation_rates.iter().copied().max().unwrap_or(0);
        assert!(
            !self.dilation_rates.is_empty() && self.dilation_rates.iter().all(|&d| d > 0),
            "Dilation rates must be non-empty and positive, got {:?}",
            self.dilation_rates
        );
        assert!(
            self.seq_len >= max_dilation,
            "Sequence length must be >= {} to support dilations {:?}",
            max_dilation,
            self.dilation_rates
        );

        let branches = self
            .dilation_rates
            .iter()
            .map(|&dilation| GruBranch {
                gru: GruConfig::new(self.num_features, self.gru_units, true).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
                dilation,
            })
            .collect::<Vec<_>>();

        let mut dense = Vec::with_capacity(self.dense_units.len());
        let mut width = self.gru_units * branches.len();
        for &units in &self.dense_units {
            dense.push(LinearConfig::new(width, units).init(device));
            width = units;
        }

        let output_layer = LinearConfig::new(width, 1).init(device);

        DilatedGruModel {
            branches,
            dense,
            dense_dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
            output_layer,
        }
    }
}

impl<B: Backend> DilatedGruModel<B> {
    /// Pre-sigmoid scores
    ///
    /// Input shape: [batch_size, seq_len, num_features]
    /// Output shape: [batch_size, 1]
    pub fn forward_logits(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let branch_outputs: Vec<Tensor<B, 2>> = self
            .branches
            .iter()
            .map(|branch| branch.forward(input.clone()))
            .collect();
        let mut x = Tensor::cat(branch_outputs, 1);

        for layer in &self.dense {
            x = self.dense_dropout.forward(self.activation.forward(layer.forward(x)));
        }

        self.output_layer.forward(x)
    }

    /// Probability of "buy": [batch_size, 1], values in [0, 1]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        activation::sigmoid(self.forward_logits(input))
    }

    /// Sum of squared dense-layer weights (the output unit is not penalized)
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let device = self.output_layer.weight.val().device();
        self.dense
            .iter()
            .map(|layer| layer.weight.val().powf_scalar(2.0).sum())
            .fold(Tensor::zeros([1], &device), |acc, sq| acc + sq)
    }

    pub fn dilation_rates(&self) -> Vec<usize> {
        self.branches.iter().map(|b| b.dilation()).collect()
    }
}
