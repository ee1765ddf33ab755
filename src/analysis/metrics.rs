//! Binary classification metrics and ROC analysis.

use serde::Serialize;

/// Confusion matrix for binary classification (0 = sell, 1 = buy)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t != 0, p != 0) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn actual_negatives(&self) -> usize {
        self.tn + self.fp
    }

    pub fn actual_positives(&self) -> usize {
        self.tp + self.fn_
    }

    /// Text table with true classes as rows and predictions as columns
    pub fn display(&self) -> String {
        format!(
            "            Predicted\n\
             True     Sell    Buy\n\
             Sell   {:>5}  {:>5}\n\
             Buy    {:>5}  {:>5}",
            self.tn, self.fp, self.fn_, self.tp
        )
    }
}

fn ratio(num: usize, denom: usize) -> Option<f64> {
    (denom > 0).then(|| num as f64 / denom as f64)
}

/// Threshold-based metrics for one fold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// TN / (TN + FP); NaN when the fold has no actual negatives
    pub specificity: f64,
}

impl ClassificationMetrics {
    /// Precision, recall and F1 fall back to 0.0 on a zero denominator.
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let accuracy = ratio(cm.tp + cm.tn, cm.total()).unwrap_or(0.0);
        let precision = ratio(cm.tp, cm.tp + cm.fp).unwrap_or(0.0);
        let recall = ratio(cm.tp, cm.actual_positives()).unwrap_or(0.0);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let specificity = ratio(cm.tn, cm.actual_negatives()).unwrap_or(f64::NAN);

        Self {
            accuracy,
            precision,
            recall,
            f1,
            specificity,
        }
    }
}

/// Hard 0/1 predictions from probabilities; strictly above `threshold` is 1
pub fn threshold_predictions(probabilities: &[f64], threshold: f64) -> Vec<u8> {
    probabilities
        .iter()
        .map(|&p| u8::from(p > threshold))
        .collect()
}

/// Receiver operating characteristic curve
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decreasing; the first entry is +inf and pairs with the (0, 0) point
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    pub fn auc(&self) -> f64 {
        auc(&self.fpr, &self.tpr)
    }
}

/// ROC curve from binary labels and scores.
///
/// One point per distinct score (highest first), an initial (0, 0) point,
/// and collinear interior points dropped. Returns `None` when only one
/// class is present, since either rate is then undefined.
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Option<RocCurve> {
    let n = y_true.len().min(scores.len());
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative counts at the last index of each distinct score
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0_usize;
    for (rank, &i) in order.iter().enumerate() {
        if y_true[i] != 0 {
            tp += 1;
        }
        let is_last_of_value = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if is_last_of_value {
            tps.push(tp as f64);
            fps.push((rank + 1 - tp) as f64);
            thresholds.push(scores[i]);
        }
    }

    let positives = *tps.last()?;
    let negatives = *fps.last()?;
    if positives == 0.0 || negatives == 0.0 {
        return None;
    }

    if tps.len() > 2 {
        let keep: Vec<usize> = (0..tps.len())
            .filter(|&k| {
                k == 0
                    || k == tps.len() - 1
                    || fps[k - 1] - 2.0 * fps[k] + fps[k + 1] != 0.0
                    || tps[k - 1] - 2.0 * tps[k] + tps[k + 1] != 0.0
            })
            .collect();
        tps = keep.iter().map(|&k| tps[k]).collect();
        fps = keep.iter().map(|&k| fps[k]).collect();
        thresholds = keep.iter().map(|&k| thresholds[k]).collect();
    }

    let mut fpr = Vec::with_capacity(fps.len() + 1);
    let mut tpr = Vec::with_capacity(tps.len() + 1);
    fpr.push(0.0);
    tpr.push(0.0);
    fpr.extend(fps.iter().map(|f| f / negatives));
    tpr.extend(tps.iter().map(|t| t / positives));
    thresholds.insert(0, f64::INFINITY);

    Some(RocCurve {
        fpr,
        tpr,
        thresholds,
    })
}

/// Area under a curve by the trapezoidal rule. `x` must be monotonic.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum::<f64>()
        .abs()
}

/// `n` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Piecewise-linear interpolation of (xp, fp) at each `x`.
///
/// `xp` must be non-decreasing. Values outside the range clamp to the end
/// points; at a repeated `xp` value the last matching point is used.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return vec![f64::NAN; x.len()];
    }

    x.iter()
        .map(|&v| {
            if v < xp[0] {
                return fp[0];
            }
            // last j with xp[j] <= v
            let j = xp[..n].partition_point(|&p| p <= v) - 1;
            if j >= n - 1 {
                return fp[n - 1];
            }
            let dx = xp[j + 1] - xp[j];
            if dx == 0.0 {
                fp[j]
            } else {
                fp[j] + (v - xp[j]) * (fp[j + 1] - fp[j]) / dx
            }
        })
        .collect()
}

/// Elementwise mean of equal-length curves
pub fn mean_curve(curves: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = curves.first() else {
        return vec![];
    };
    let n = curves.len() as f64;
    (0..first.len())
        .map(|i| curves.iter().map(|c| c[i]).sum::<f64>() / n)
        .collect()
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
