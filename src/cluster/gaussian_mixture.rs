use super::KMeans;
use crate::error::{ClusterError, Result};
use crate::linalg::{cholesky, solve_lower};
use crate::{Labels, Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Full-covariance Gaussian mixture fitted by expectation-maximization.
///
/// Responsibilities are initialized from a single seeded k-means run. The
/// component means double as cluster centers, and new observations are
/// assigned to their most probable component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianMixture {
    pub means: Option<Matrix>,
    pub covariances: Option<Vec<Matrix>>,
    pub weights: Option<Vector>,
    pub labels: Option<Labels>,
    pub converged: bool,
    pub n_iter: usize,
    pub lower_bound: Option<f64>,
    n_components: usize,
    max_iter: usize,
    tolerance: f64,
    reg_covar: f64,
    random_state: u64,
}

impl GaussianMixture {
    pub fn new(n_components: usize) -> Self {
        Self {
            means: None,
            covariances: None,
            weights: None,
            labels: None,
            converged: false,
            n_iter: 0,
            lower_bound: None,
            n_components,
            max_iter: 100,
            tolerance: 1e-3,
            reg_covar: 1e-6,
            random_state: 42,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if self.n_components == 0 {
            return Err(ClusterError::invalid_parameter("n_components must be > 0"));
        }
        if self.reg_covar < 0.0 || self.max_iter == 0 {
            return Err(ClusterError::invalid_parameter(
                "reg_covar must be >= 0 and max_iter > 0",
            ));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        if x.nrows() < self.n_components {
            return Err(ClusterError::insufficient_data(self.n_components, x.nrows()));
        }

        let initial_labels = KMeans::new(self.n_components)
            .n_init(1)
            .random_state(self.random_state)
            .fit_predict(x)?;
        let mut resp = Matrix::zeros((x.nrows(), self.n_components));
        for (i, &label) in initial_labels.iter().enumerate() {
            resp[[i, label as usize]] = 1.0;
        }
        self.m_step(x, &resp)?;

        let mut previous = f64::NEG_INFINITY;
        self.converged = false;
        for iteration in 1..=self.max_iter {
            let (log_resp, lower_bound) = self.e_step(x)?;
            self.m_step(x, &log_resp.mapv(f64::exp))?;
            self.n_iter = iteration;
            self.lower_bound = Some(lower_bound);

            if (lower_bound - previous).abs() < self.tolerance {
                self.converged = true;
                break;
            }
            previous = lower_bound;
        }
        debug!(
            "Gaussian mixture finished after {} iterations (converged: {})",
            self.n_iter, self.converged
        );

        let (log_resp, _) = self.e_step(x)?;
        self.labels = Some(argmax_rows(&log_resp));
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| ClusterError::invalid_parameter("Gaussian mixture produced no labels"))
    }

    pub fn predict(&self, x: &Matrix) -> Result<Labels> {
        let (log_resp, _) = self.e_step(x)?;
        Ok(argmax_rows(&log_resp))
    }

    pub fn predict_proba(&self, x: &Matrix) -> Result<Matrix> {
        let (log_resp, _) = self.e_step(x)?;
        Ok(log_resp.mapv(f64::exp))
    }

    pub fn predict_row(&self, row: &ArrayView1<f64>) -> Result<usize> {
        let x = row.to_owned().insert_axis(Axis(0));
        let labels = self.predict(&x)?;
        Ok(labels[0] as usize)
    }

    fn e_step(&self, x: &Matrix) -> Result<(Matrix, f64)> {
        let (means, covariances, weights) = match (&self.means, &self.covariances, &self.weights) {
            (Some(m), Some(c), Some(w)) => (m, c, w),
            _ => {
                return Err(ClusterError::invalid_parameter(
                    "GaussianMixture not fitted. Call fit() first.",
                ))
            }
        };
        if x.ncols() != means.ncols() {
            return Err(ClusterError::invalid_parameter(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                x.ncols(),
                means.ncols()
            )));
        }

        let n = x.nrows();
        let d = x.ncols() as f64;
        let mut log_prob = Matrix::zeros((n, self.n_components));

        for k in 0..self.n_components {
            let l = cholesky(&covariances[k])?;
            let log_det: f64 = 2.0 * l.diag().mapv(f64::ln).sum();
            let log_weight = weights[k].ln();
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                let diff = &row - &means.row(k);
                let z = solve_lower(&l, &diff.view());
                let mahalanobis = z.dot(&z);
                log_prob[[i, k]] = log_weight - 0.5 * (d * (2.0 * PI).ln() + log_det + mahalanobis);
            }
        }

        let mut total = 0.0;
        for mut row in log_prob.axis_iter_mut(Axis(0)) {
            let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            let norm = max + row.mapv(|v| (v - max).exp()).sum().ln();
            row.mapv_inplace(|v| v - norm);
            total += norm;
        }

        Ok((log_prob, total / n as f64))
    }

    fn m_step(&mut self, x: &Matrix, resp: &Matrix) -> Result<()> {
        let n = x.nrows();
        let n_features = x.ncols();
        let nk = resp.sum_axis(Axis(0)).mapv(|v| v + 10.0 * f64::EPSILON);
        let means = resp.t().dot(x) / &nk.view().insert_axis(Axis(1));

        let mut covariances = Vec::with_capacity(self.n_components);
        for k in 0..self.n_components {
            let centered = x - &means.row(k).insert_axis(Axis(0));
            let weighted = &centered * &resp.column(k).insert_axis(Axis(1));
            let mut cov = weighted.t().dot(&centered) / nk[k];
            for j in 0..n_features {
                cov[[j, j]] += self.reg_covar;
            }
            covariances.push(cov);
        }

        self.weights = Some(&nk / n as f64);
        self.means = Some(means);
        self.covariances = Some(covariances);
        Ok(())
    }
}

fn argmax_rows(m: &Matrix) -> Labels {
    m.axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (k, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = k;
                }
            }
            best as i32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Matrix {
        array![
            [1.8, 2.0],
            [2.0, 2.2],
            [2.1, 1.9],
            [2.2, 2.0],
            [1.9, 2.1],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 4.9],
            [4.8, 5.1],
            [5.0, 4.8]
        ]
    }

    #[test]
    fn test_gmm_separates_components() {
        let x = two_blobs();
        let mut gmm = GaussianMixture::new(2);
        let labels = gmm.fit_predict(&x).unwrap();

        assert!(labels.iter().take(5).all(|&l| l == labels[0]));
        assert!(labels.iter().skip(5).all(|&l| l == labels[5]));
        assert_ne!(labels[0], labels[5]);

        let weights = gmm.weights.as_ref().unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-9);

        let means = gmm.means.as_ref().unwrap();
        let first = labels[0] as usize;
        assert!((means[[first, 0]] - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_gmm_predict_matches_training_labels() {
        let x = two_blobs();
        let mut gmm = GaussianMixture::new(2);
        let labels = gmm.fit_predict(&x).unwrap();

        assert_eq!(gmm.predict(&x).unwrap(), labels);
        assert_eq!(gmm.predict_row(&x.row(7)).unwrap() as i32, labels[7]);
    }

    #[test]
    fn test_gmm_probabilities_sum_to_one() {
        let x = two_blobs();
        let mut gmm = GaussianMixture::new(2);
        gmm.fit(&x).unwrap();

        let proba = gmm.predict_proba(&x).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gmm_predict_without_fit() {
        let gmm = GaussianMixture::new(2);
        assert!(gmm.predict(&two_blobs()).is_err());
    }
}
