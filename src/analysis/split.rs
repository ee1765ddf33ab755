use std::ops::Range;

use crate::error::{Error, Result};

/// Train/test ranges for one fold. Both are contiguous and the test range
/// starts where the training range ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window (forward chaining) splits over `n_samples` ordered samples.
///
/// The sample range is cut into `n_splits + 1` blocks of
/// `n_samples / (n_splits + 1)`; any remainder goes to the first training
/// block. Fold k trains on everything before test block k, so training sets
/// grow and never see later data. Nothing is shuffled.
pub fn expanding_window_splits(n_samples: usize, n_splits: usize) -> Result<Vec<FoldSplit>> {
    if n_splits == 0 || n_splits + 1 > n_samples {
        return Err(Error::TooFewSamples {
            samples: n_samples,
            splits: n_splits,
        });
    }

    let test_size = n_samples / (n_splits + 1);
    let first_test_start = n_samples - n_splits * test_size;

    Ok((0..n_splits)
        .map(|k| {
            let start = first_test_start + k * test_size;
            FoldSplit {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}
