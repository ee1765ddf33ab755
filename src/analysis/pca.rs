//! Principal component projection for standardized feature matrices.

use ndarray::{Array1, Array2, Axis};

/// Fitted principal components
#[derive(Debug, Clone)]
pub struct Pca {
    /// Column means of the fitted data
    pub mean: Array1<f64>,
    /// Components as columns, strongest first: [n_features, n_components]
    pub components: Array2<f64>,
    /// Variance captured by each component
    pub explained_variance: Array1<f64>,
}

impl Pca {
    /// Fit the top `n_components` components of `data` ([n_samples, n_features]).
    ///
    /// `n_components` is capped at the number of features.
    pub fn fit(data: &Array2<f64>, n_components: usize) -> Self {
        let n_features = data.ncols();
        let k = n_components.min(n_features);

        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let cov = covariance_matrix(data, &mean);

        let mut components = Array2::zeros((n_features, k));
        let mut explained_variance = Array1::zeros(k);
        let mut deflated = cov;

        for i in 0..k {
            let (eigenvalue, eigenvector) = power_iteration(&deflated, 500, 1e-12);
            explained_variance[i] = eigenvalue.max(0.0);
            components.column_mut(i).assign(&eigenvector);

            // A = A - λ v vᵀ
            let v = eigenvector.view().insert_axis(Axis(1));
            deflated = deflated - eigenvalue * v.dot(&v.t());
        }

        Self {
            mean,
            components,
            explained_variance,
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.components)
    }

    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }
}

fn covariance_matrix(data: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let n = data.nrows();
    let centered = data - mean;
    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    centered.t().dot(&centered) / denom
}

fn power_iteration(matrix: &Array2<f64>, max_iter: usize, tol: f64) -> (f64, Array1<f64>) {
    let n = matrix.nrows();
    // Uneven start vector so symmetric inputs don't land on a zero projection
    let mut v = Array1::from_iter((0..n).map(|i| 1.0 + i as f64 / n as f64));
    let norm = v.dot(&v).sqrt();
    v /= norm;
    let mut eigenvalue = 0.0;

    for _ in 0..max_iter {
        let mut next = matrix.dot(&v);
        let next_eigenvalue = v.dot(&next);

        let norm = next.dot(&next).sqrt();
        if norm < 1e-12 {
            return (0.0, v);
        }
        next /= norm;

        let converged = (next_eigenvalue - eigenvalue).abs() < tol;
        eigenvalue = next_eigenvalue;
        v = next;
        if converged {
            break;
        }
    }

    (eigenvalue, v)
}
