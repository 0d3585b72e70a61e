use super::KMeans;
use crate::error::{ClusterError, Result};
use crate::linalg::{orthonormalize_columns, squared_euclidean};
use crate::{Labels, Matrix};
use ndarray::Axis;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const EMBEDDING_MAX_ITER: usize = 500;
const EMBEDDING_TOLERANCE: f64 = 1e-9;

/// Graph-cut clustering on an RBF similarity graph.
///
/// Builds `A = exp(-gamma * |x_i - x_j|^2)` (zero diagonal), normalizes it to
/// `D^-1/2 A D^-1/2`, takes its leading `n_clusters` eigenvectors by seeded
/// orthogonal iteration, normalizes each row of that embedding to unit length
/// and runs k-means on the rows. Produces labels only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralClustering {
    pub labels: Option<Labels>,
    n_clusters: usize,
    gamma: f64,
    random_state: u64,
}

impl SpectralClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            labels: None,
            n_clusters,
            gamma: 1.0,
            random_state: 42,
        }
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusterError::invalid_parameter("n_clusters must be > 0"));
        }
        if !(self.gamma > 0.0) {
            return Err(ClusterError::invalid_parameter(format!(
                "gamma must be > 0, got {}",
                self.gamma
            )));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        if x.nrows() < self.n_clusters {
            return Err(ClusterError::insufficient_data(self.n_clusters, x.nrows()));
        }

        let affinity = self.normalized_affinity(x);
        let mut embedding = self.leading_eigenvectors(&affinity);

        for mut row in embedding.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        let labels = KMeans::new(self.n_clusters)
            .random_state(self.random_state)
            .fit_predict(&embedding)?;
        self.labels = Some(labels);
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| ClusterError::invalid_parameter("Spectral clustering produced no labels"))
    }

    fn normalized_affinity(&self, x: &Matrix) -> Matrix {
        let n = x.nrows();
        let mut affinity = Matrix::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let a = (-self.gamma * squared_euclidean(&x.row(i), &x.row(j))).exp();
                affinity[[i, j]] = a;
                affinity[[j, i]] = a;
            }
        }

        // Isolated vertices keep a unit degree so the scaling stays finite.
        let inv_sqrt_degree = affinity
            .sum_axis(Axis(1))
            .mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 1.0 });
        for i in 0..n {
            for j in 0..n {
                affinity[[i, j]] *= inv_sqrt_degree[i] * inv_sqrt_degree[j];
            }
        }
        affinity
    }

    /// Orthogonal iteration on `M + I`, whose spectrum lies in `[0, 2]` and
    /// shares its leading eigenvectors with `M`.
    fn leading_eigenvectors(&self, m: &Matrix) -> Matrix {
        let n = m.nrows();
        let k = self.n_clusters;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut q = Matrix::random_using((n, k), Uniform::new(-1.0, 1.0), &mut rng);
        orthonormalize_columns(&mut q);

        for iteration in 0..EMBEDDING_MAX_ITER {
            let mut next = m.dot(&q) + &q;
            orthonormalize_columns(&mut next);

            // Residual of the new basis after projecting onto the old subspace.
            let projection = q.dot(&q.t().dot(&next));
            let residual = (&next - &projection).mapv(|v| v * v).sum().sqrt();
            q = next;
            if residual < EMBEDDING_TOLERANCE {
                debug!("Spectral embedding converged after {} iterations", iteration + 1);
                return q;
            }
        }

        warn!(
            "Spectral embedding did not converge within {} iterations",
            EMBEDDING_MAX_ITER
        );
        q
    }
}
