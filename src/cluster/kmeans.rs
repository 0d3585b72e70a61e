use crate::error::{ClusterError, Result};
use crate::linalg::{nearest_row, squared_euclidean};
use crate::{Labels, Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Lloyd's k-means with k-means++ seeding.
///
/// All randomness comes from a `ChaCha8Rng` seeded with `random_state`, so two
/// fits on the same data with the same settings produce identical centers.
/// `n_init` independent seedings are run and the lowest-inertia result is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Labels>,
    pub inertia: Option<f64>,
    n_clusters: usize,
    max_iter: usize,
    tolerance: f64,
    n_init: usize,
    random_state: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            n_init: 10,
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

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
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
        if self.max_iter == 0 || self.n_init == 0 {
            return Err(ClusterError::invalid_parameter(
                "max_iter and n_init must be > 0",
            ));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        if x.nrows() < self.n_clusters {
            return Err(ClusterError::insufficient_data(self.n_clusters, x.nrows()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Matrix, Labels, f64)> = None;

        for _ in 0..self.n_init {
            let initial = self.initialize_centroids(x, &mut rng);
            let (centroids, labels, inertia) = self.lloyd(x, initial);
            let improved = best
                .as_ref()
                .map_or(true, |(_, _, best_inertia)| inertia < *best_inertia);
            if improved {
                best = Some((centroids, labels, inertia));
            }
        }

        if let Some((centroids, labels, inertia)) = best {
            self.cluster_centers = Some(centroids);
            self.labels = Some(labels);
            self.inertia = Some(inertia);
        }

        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Labels> {
        let centroids = self.fitted_centers()?;
        if x.ncols() != centroids.ncols() {
            return Err(ClusterError::invalid_parameter(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                x.ncols(),
                centroids.ncols()
            )));
        }

        Ok(x
            .axis_iter(Axis(0))
            .map(|row| nearest_row(&row, centroids) as i32)
            .collect())
    }

    pub fn predict_row(&self, row: &ArrayView1<f64>) -> Result<usize> {
        let centroids = self.fitted_centers()?;
        if row.len() != centroids.ncols() {
            return Err(ClusterError::invalid_parameter(format!(
                "Observation has {} features, model expects {}",
                row.len(),
                centroids.ncols()
            )));
        }
        Ok(nearest_row(row, centroids))
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| ClusterError::invalid_parameter("KMeans produced no labels"))
    }

    fn fitted_centers(&self) -> Result<&Matrix> {
        self.cluster_centers
            .as_ref()
            .ok_or_else(|| ClusterError::invalid_parameter("KMeans not fitted. Call fit() first."))
    }

    fn lloyd(&self, x: &Matrix, mut centroids: Matrix) -> (Matrix, Labels, f64) {
        let n = x.nrows();
        let mut labels = Labels::zeros(n);

        for _ in 0..self.max_iter {
            let old_centroids = centroids.clone();

            // Assign points to nearest centroid
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                labels[i] = nearest_row(&row, &centroids) as i32;
            }

            // Update centroids
            let mut sums = Matrix::zeros((self.n_clusters, x.ncols()));
            let mut counts = vec![0usize; self.n_clusters];
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                let k = labels[i] as usize;
                let mut sum = sums.row_mut(k);
                sum += &row;
                counts[k] += 1;
            }
            for k in 0..self.n_clusters {
                if counts[k] > 0 {
                    let mean = sums.row(k).mapv(|v| v / counts[k] as f64);
                    centroids.row_mut(k).assign(&mean);
                } else {
                    // Empty cluster: move it onto the point worst served by its centroid.
                    let far = self.farthest_point(x, &centroids, &labels);
                    centroids.row_mut(k).assign(&x.row(far));
                    labels[far] = k as i32;
                }
            }

            if self.max_centroid_shift(&old_centroids, &centroids) < self.tolerance {
                break;
            }
        }

        let mut inertia = 0.0;
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let k = nearest_row(&row, &centroids);
            labels[i] = k as i32;
            inertia += squared_euclidean(&row, &centroids.row(k));
        }

        (centroids, labels, inertia)
    }

    fn initialize_centroids(&self, x: &Matrix, rng: &mut ChaCha8Rng) -> Matrix {
        let n = x.nrows();
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));

        let first = rng.gen_range(0..n);
        centroids.row_mut(0).assign(&x.row(first));

        let mut distances = Vector::from_elem(n, f64::INFINITY);
        for k in 1..self.n_clusters {
            // Squared distance to the nearest chosen centroid
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                let d = squared_euclidean(&row, &centroids.row(k - 1));
                if d < distances[i] {
                    distances[i] = d;
                }
            }

            let total: f64 = distances.sum();
            let chosen = if total > 0.0 {
                let target = rng.gen_range(0.0..1.0) * total;
                let mut cumulative = 0.0;
                let mut pick = n - 1;
                for (i, &d) in distances.iter().enumerate() {
                    cumulative += d;
                    if cumulative >= target && d > 0.0 {
                        pick = i;
                        break;
                    }
                }
                pick
            } else {
                rng.gen_range(0..n)
            };
            centroids.row_mut(k).assign(&x.row(chosen));
        }

        centroids
    }

    fn farthest_point(&self, x: &Matrix, centroids: &Matrix, labels: &Labels) -> usize {
        let mut far = 0;
        let mut far_distance = f64::NEG_INFINITY;
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let d = squared_euclidean(&row, &centroids.row(labels[i] as usize));
            if d > far_distance {
                far_distance = d;
                far = i;
            }
        }
        far
    }

    fn max_centroid_shift(&self, old_centroids: &Matrix, new_centroids: &Matrix) -> f64 {
        old_centroids
            .axis_iter(Axis(0))
            .zip(new_centroids.axis_iter(Axis(0)))
            .map(|(a, b)| squared_euclidean(&a, &b).sqrt())
            .fold(0.0, f64::max)
    }
}
