use crate::error::{ClusterError, Result};
use crate::linalg::squared_euclidean;
use crate::{Labels, Matrix};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum increase of within-cluster variance.
    #[default]
    Ward,
    Complete,
    Average,
    Single,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Merge {
    a: usize,
    b: usize,
    height: f64,
}

/// Bottom-up hierarchical clustering cut at a fixed number of clusters.
///
/// The full dendrogram is built with the nearest-neighbour chain algorithm
/// (valid for all four linkages since they are reducible), then the
/// `n_samples - n_clusters` lowest merges are replayed. Labels are numbered in
/// order of first appearance. There is no way to assign a new observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgglomerativeClustering {
    pub labels: Option<Labels>,
    n_clusters: usize,
    linkage: Linkage,
}

impl AgglomerativeClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            labels: None,
            n_clusters,
            linkage: Linkage::Ward,
        }
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusterError::invalid_parameter("n_clusters must be > 0"));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        if x.nrows() < self.n_clusters {
            return Err(ClusterError::insufficient_data(self.n_clusters, x.nrows()));
        }

        let mut merges = self.build_dendrogram(x);
        merges.sort_by(|m1, m2| m1.height.partial_cmp(&m2.height).unwrap_or(Ordering::Equal));

        let n = x.nrows();
        let mut parent: Vec<usize> = (0..n).collect();
        for merge in merges.iter().take(n - self.n_clusters) {
            let ra = find(&mut parent, merge.a);
            let rb = find(&mut parent, merge.b);
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        let mut ids: HashMap<usize, i32> = HashMap::new();
        let mut labels = Labels::zeros(n);
        for i in 0..n {
            let root = find(&mut parent, i);
            let next = ids.len() as i32;
            labels[i] = *ids.entry(root).or_insert(next);
        }

        self.labels = Some(labels);
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| ClusterError::invalid_parameter("Agglomerative clustering produced no labels"))
    }

    fn build_dendrogram(&self, x: &Matrix) -> Vec<Merge> {
        let n = x.nrows();
        let mut dist = Matrix::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d2 = squared_euclidean(&x.row(i), &x.row(j));
                // Ward's update works on squared distances
                let d = match self.linkage {
                    Linkage::Ward => d2,
                    _ => d2.sqrt(),
                };
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }

        let mut size = vec![1usize; n];
        let mut active = vec![true; n];
        let mut chain: Vec<usize> = Vec::with_capacity(n);
        let mut merges = Vec::with_capacity(n.saturating_sub(1));
        let mut remaining = n;

        while remaining > 1 {
            if chain.is_empty() {
                if let Some(first) = (0..n).find(|&i| active[i]) {
                    chain.push(first);
                }
            }

            loop {
                let a = chain[chain.len() - 1];
                let previous = if chain.len() >= 2 {
                    Some(chain[chain.len() - 2])
                } else {
                    None
                };

                // The previous chain element wins ties, which guarantees termination.
                let mut best = previous;
                let mut best_distance = previous.map_or(f64::INFINITY, |p| dist[[a, p]]);
                for c in 0..n {
                    if c != a && active[c] && dist[[a, c]] < best_distance {
                        best_distance = dist[[a, c]];
                        best = Some(c);
                    }
                }

                let Some(b) = best else {
                    // Only one active cluster left.
                    remaining = 1;
                    break;
                };

                if Some(b) == previous {
                    chain.truncate(chain.len() - 2);
                    let height = match self.linkage {
                        Linkage::Ward => best_distance.max(0.0).sqrt(),
                        _ => best_distance,
                    };
                    merges.push(Merge { a, b, height });
                    self.merge_slots(&mut dist, &mut size, &mut active, a, b);
                    remaining -= 1;
                    break;
                }
                chain.push(b);
            }
        }

        merges
    }

    /// Lance-Williams update: the merged cluster lives in the lower slot.
    fn merge_slots(
        &self,
        dist: &mut Matrix,
        size: &mut [usize],
        active: &mut [bool],
        a: usize,
        b: usize,
    ) {
        let (keep, drop) = (a.min(b), a.max(b));
        let na = size[a] as f64;
        let nb = size[b] as f64;
        let dab = dist[[a, b]];

        for c in 0..active.len() {
            if !active[c] || c == a || c == b {
                continue;
            }
            let dca = dist[[c, a]];
            let dcb = dist[[c, b]];
            let nc = size[c] as f64;
            let updated = match self.linkage {
                Linkage::Single => dca.min(dcb),
                Linkage::Complete => dca.max(dcb),
                Linkage::Average => (na * dca + nb * dcb) / (na + nb),
                Linkage::Ward => ((na + nc) * dca + (nb + nc) * dcb - nc * dab) / (na + nb + nc),
            };
            dist[[keep, c]] = updated;
            dist[[c, keep]] = updated;
        }

        size[keep] = size[a] + size[b];
        active[drop] = false;
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_blobs() -> Matrix {
        array![
            [0.0, 0.0],
            [0.3, 0.1],
            [0.1, 0.4],
            [5.0, 5.0],
            [5.2, 5.1],
            [4.9, 5.3],
            [10.0, 0.0],
            [10.1, 0.3],
            [9.8, 0.2]
        ]
    }

    #[test]
    fn test_agglomerative_recovers_blobs_for_every_linkage() {
        let x = three_blobs();
        for linkage in [Linkage::Ward, Linkage::Complete, Linkage::Average, Linkage::Single] {
            let mut model = AgglomerativeClustering::new(3).linkage(linkage);
            let labels = model.fit_predict(&x).unwrap();

            assert_eq!(labels.to_vec(), vec![0, 0, 0, 1, 1, 1, 2, 2, 2], "{:?}", linkage);
        }
    }

    #[test]
    fn test_agglomerative_single_cluster() {
        let x = three_blobs();
        let mut model = AgglomerativeClustering::new(1);
        let labels = model.fit_predict(&x).unwrap();
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_agglomerative_one_cluster_per_point() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [3.0, 0.0]];
        let mut model = AgglomerativeClustering::new(3);
        let labels = model.fit_predict(&x).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_single_linkage_chains_points() {
        // A chain of close points plus one distant point.
        let x = array![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [10.0, 0.0]];
        let mut model = AgglomerativeClustering::new(2).linkage(Linkage::Single);
        let labels = model.fit_predict(&x).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_agglomerative_insufficient_samples() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        assert!(AgglomerativeClustering::new(3).fit(&x).is_err());
    }
}
