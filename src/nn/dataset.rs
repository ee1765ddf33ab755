use std::ops::Range;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor},
};
use ndarray::Array2;

use crate::analysis::pca::Pca;
use crate::analysis::scaling::{fill_missing, StandardScaler};
use crate::data::models::FeatureTable;
use crate::error::{Error, Result};

/// A single training sample: a window of feature rows and the signal that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSample {
    /// Feature matrix: [seq_len, num_features]
    pub features: Vec<Vec<f64>>,
    /// 1 = buy, 0 = sell
    pub label: u8,
}

/// Ordered collection of equally shaped windows
#[derive(Debug, Clone, Default)]
pub struct SignalDataset {
    pub samples: Vec<SignalSample>,
}

impl Dataset<SignalSample> for SignalDataset {
    fn get(&self, index: usize) -> Option<SignalSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

impl SignalDataset {
    pub fn new(samples: Vec<SignalSample>) -> Result<Self> {
        if let Some(first) = samples.first() {
            let expected = [first.features.len(), first.features.first().map_or(0, |r| r.len())];
            for sample in &samples {
                let rows = sample.features.len();
                let cols = sample.features.first().map_or(0, |r| r.len());
                if rows != expected[0] || sample.features.iter().any(|r| r.len() != expected[1]) {
                    return Err(Error::ShapeMismatch {
                        expected: expected.to_vec(),
                        actual: vec![rows, cols],
                    });
                }
            }
        }
        Ok(Self { samples })
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn seq_len(&self) -> usize {
        self.samples.first().map_or(0, |s| s.features.len())
    }

    pub fn num_features(&self) -> usize {
        self.samples
            .first()
            .and_then(|s| s.features.first().map(|f| f.len()))
            .unwrap_or(0)
    }

    pub fn labels(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Contiguous sub-range copied into a new dataset
    pub fn subset(&self, range: Range<usize>) -> Self {
        Self {
            samples: self.samples[range].to_vec(),
        }
    }

    /// Split at `index`: samples before it, and samples from it on
    pub fn split_at(&self, index: usize) -> (Self, Self) {
        let (head, tail) = self.samples.split_at(index.min(self.samples.len()));
        (Self { samples: head.to_vec() }, Self { samples: tail.to_vec() })
    }
}

/// Slide a `seq_len` window one row at a time over `features`.
///
/// Window i covers rows i..i+seq_len and is labelled with `labels[i + seq_len]`,
/// so `max(rows - seq_len, 0)` windows are produced.
pub fn build_sequences(features: &Array2<f64>, labels: &[u8], seq_len: usize) -> Result<SignalDataset> {
    if features.nrows() != labels.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![features.nrows()],
            actual: vec![labels.len()],
        });
    }

    let n_windows = features.nrows().saturating_sub(seq_len);
    let mut samples = Vec::with_capacity(n_windows);
    for i in 0..n_windows {
        let window = (i..i + seq_len)
            .map(|t| features.row(t).to_vec())
            .collect();
        samples.push(SignalSample {
            features: window,
            label: labels[i + seq_len],
        });
    }

    SignalDataset::new(samples)
}

/// Turn a merged feature table into labelled windows.
///
/// The label column is removed from the features, the remaining columns are
/// standardized on all rows given (fit only on the training period if
/// leakage matters), missing cells are set to the column mean, and the
/// result is optionally projected onto `n_components` principal
/// components before windowing.
pub fn prepare_features(
    table: &FeatureTable,
    label_col: &str,
    n_components: Option<usize>,
    seq_len: usize,
) -> Result<SignalDataset> {
    if table.is_empty() {
        return Err(Error::EmptyInput("feature table has no rows"));
    }
    let label_idx = table
        .column_index(label_col)
        .ok_or_else(|| Error::MissingColumn(label_col.to_string()))?;

    let labels = table
        .column(label_idx)
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(x) if x == 0.0 || x == 1.0 => Ok(x as u8),
            other => Err(Error::InvalidLabel {
                row,
                value: other.unwrap_or(f64::NAN),
            }),
        })
        .collect::<Result<Vec<u8>>>()?;

    let feature_idx: Vec<usize> = (0..table.columns.len()).filter(|&i| i != label_idx).collect();
    if feature_idx.is_empty() {
        return Err(Error::EmptyInput("no feature columns besides the label"));
    }

    let raw = Array2::from_shape_fn((table.len(), feature_idx.len()), |(r, c)| {
        table.rows[r]
            .values
            .get(feature_idx[c])
            .copied()
            .flatten()
            .unwrap_or(f64::NAN)
    });

    let (_, mut scaled) = StandardScaler::fit_transform(&raw);
    let filled = fill_missing(&mut scaled, 0.0);
    if filled > 0 {
        tracing::debug!("Imputed {} missing feature cells with the column mean", filled);
    }

    let features = match n_components {
        Some(k) => {
            let pca = Pca::fit(&scaled, k);
            tracing::info!(
                "Reduced {} features to {} principal components",
                feature_idx.len(),
                pca.n_components()
            );
            pca.transform(&scaled)
        }
        None => scaled,
    };

    let dataset = build_sequences(&features, &labels, seq_len)?;
    tracing::info!(
        "Built {} windows of length {} from {} rows",
        dataset.len(),
        seq_len,
        table.len()
    );
    Ok(dataset)
}

/// Batcher that converts SignalSample slices into tensors
#[derive(Clone, Debug)]
pub struct SignalBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SignalBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Batched windows and labels
#[derive(Debug, Clone)]
pub struct SignalBatch<B: Backend> {
    pub inputs: Tensor<B, 3>,  // [batch_size, seq_len, num_features]
    pub targets: Tensor<B, 2>, // [batch_size, 1]
}

impl<B: Backend> Batcher<SignalSample, SignalBatch<B>> for SignalBatcher<B> {
    fn batch(&self, items: Vec<SignalSample>) -> SignalBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map(|s| s.features.len()).unwrap_or(0);
        let num_features = items
            .first()
            .and_then(|s| s.features.first().map(|f| f.len()))
            .unwrap_or(0);

        let mut input_data = Vec::with_capacity(batch_size * seq_len * num_features);
        let mut target_data = Vec::with_capacity(batch_size);

        for sample in &items {
            for step in &sample.features {
                for &f in step {
                    input_data.push(f as f32);
                }
            }
            target_data.push(sample.label as f32);
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), &self.device)
            .reshape([batch_size, seq_len, num_features]);

        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        SignalBatch { inputs, targets }
    }
}
