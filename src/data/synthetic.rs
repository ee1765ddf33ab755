use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::nn::dataset::{SignalDataset, SignalSample};

/// Uniform [0, 1) windows with labels drawn uniformly from {0, 1}.
///
/// The seed fixes the data only; model training stays non-deterministic.
pub fn random_windows(num_samples: usize, seq_len: usize, num_features: usize, seed: u64) -> SignalDataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let samples = (0..num_samples)
        .map(|_| {
            let features = (0..seq_len)
                .map(|_| (0..num_features).map(|_| rng.gen::<f64>()).collect())
                .collect();
            SignalSample {
                features,
                label: rng.gen_range(0..=1),
            }
        })
        .collect();

    SignalDataset { samples }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_value_ranges() {
        let dataset = random_windows(50, 14, 10, 42);
        assert_eq!(dataset.samples.len(), 50);
        assert_eq!(dataset.seq_len(), 14);
        assert_eq!(dataset.num_features(), 10);
        assert!(dataset.samples.iter().all(|s| s.label <= 1));
        assert!(dataset
            .samples
            .iter()
            .flat_map(|s| s.features.iter().flatten())
            .all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = random_windows(5, 4, 2, 42);
        let b = random_windows(5, 4, 2, 42);
        let c = random_windows(5, 4, 2, 43);
        assert_eq!(a.samples, b.samples);
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn test_both_labels_appear() {
        let labels = random_windows(200, 1, 1, 42).labels();
        assert!(labels.contains(&0) && labels.contains(&1));
    }
}
