use crate::error::{ClusterError, Result};
use crate::linalg::euclidean;
use crate::{Labels, Matrix, NOISE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Density-based clustering with Euclidean neighbourhoods. Ignores any
/// requested cluster count.
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within `eps`. Points not reachable from any core point get
/// the [`NOISE`] label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dbscan {
    pub labels: Option<Labels>,
    pub core_sample_indices: Option<Vec<usize>>,
    eps: f64,
    min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self {
            labels: None,
            core_sample_indices: None,
            eps,
            min_samples,
        }
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if !(self.eps > 0.0) {
            return Err(ClusterError::invalid_parameter(format!(
                "eps must be > 0, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(ClusterError::invalid_parameter("min_samples must be > 0"));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::EmptyDataset);
        }

        let n_samples = x.nrows();
        let neighborhoods: Vec<Vec<usize>> = (0..n_samples)
            .map(|i| self.region_query(x, i))
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|neighbors| neighbors.len() >= self.min_samples)
            .collect();

        let mut labels = Labels::from_elem(n_samples, NOISE);
        let mut current_cluster = 0;

        for start in 0..n_samples {
            if !is_core[start] || labels[start] != NOISE {
                continue;
            }

            labels[start] = current_cluster;

            // Expand cluster using BFS
            let mut queue: VecDeque<usize> = neighborhoods[start].iter().copied().collect();
            while let Some(neighbor) = queue.pop_front() {
                if labels[neighbor] != NOISE {
                    continue;
                }
                labels[neighbor] = current_cluster;

                // Only core points extend the cluster; border points just join it
                if is_core[neighbor] {
                    queue.extend(
                        neighborhoods[neighbor]
                            .iter()
                            .copied()
                            .filter(|&nn| labels[nn] == NOISE),
                    );
                }
            }

            current_cluster += 1;
        }

        self.labels = Some(labels);
        self.core_sample_indices = Some((0..n_samples).filter(|&i| is_core[i]).collect());

        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| ClusterError::invalid_parameter("DBSCAN produced no labels"))
    }

    fn region_query(&self, x: &Matrix, point_idx: usize) -> Vec<usize> {
        (0..x.nrows())
            .filter(|&i| euclidean(&x.row(point_idx), &x.row(i)) <= self.eps)
            .collect()
    }
}
