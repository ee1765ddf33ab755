use ndarray::{Array1, Array2, Axis};

/// Per-column standardization to zero mean and unit variance.
///
/// NaN cells are treated as missing: they are skipped when fitting and
/// stay NaN after `transform`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation; 1.0 for constant or empty columns
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let n_cols = data.ncols();
        let mut mean = Array1::zeros(n_cols);
        let mut scale = Array1::ones(n_cols);

        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                continue;
            }
            let n = present.len() as f64;
            let m = present.iter().sum::<f64>() / n;
            let variance = present.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
            mean[j] = m;
            let s = variance.sqrt();
            if s > f64::EPSILON {
                scale[j] = s;
            }
        }

        Self { mean, scale }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    pub fn fit_transform(data: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let scaled = scaler.transform(data);
        (scaler, scaled)
    }
}

/// Replace NaN cells with `value`
pub fn fill_missing(data: &mut Array2<f64>, value: f64) -> usize {
    let mut filled = 0;
    data.mapv_inplace(|v| {
        if v.is_nan() {
            filled += 1;
            value
        } else {
            v
        }
    });
    filled
}
