//! Internal cluster-quality metrics.
//!
//! The scoring functions treat labels as opaque values and need at least two
//! distinct labels and fewer labels than samples; otherwise they are `None`.
//! [`evaluate`] additionally requires two distinct non-noise labels before
//! [`NoisePolicy`] decides whether noise counts as a cluster.

use crate::cluster::Algorithm;
use crate::linalg::{euclidean, squared_euclidean};
use crate::{Labels, Matrix, Vector, NOISE};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoisePolicy {
    #[default]
    AsCluster,
    Exclude,
}

/// Quality scores of one trained run. `None` means undefined for this assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub algorithm: Algorithm,
    pub silhouette: Option<f64>,
    pub davies_bouldin: Option<f64>,
    pub calinski_harabasz: Option<f64>,
}

impl EvaluationRecord {
    pub fn is_defined(&self) -> bool {
        self.silhouette.is_some()
    }
}

pub fn evaluate(
    x: &Matrix,
    labels: &Labels,
    algorithm: Algorithm,
    policy: NoisePolicy,
) -> EvaluationRecord {
    let clusters: BTreeSet<i32> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    if clusters.len() < 2 {
        info!(
            "{} evaluation undefined: {} non-noise cluster(s)",
            algorithm,
            clusters.len()
        );
        return EvaluationRecord {
            algorithm,
            silhouette: None,
            davies_bouldin: None,
            calinski_harabasz: None,
        };
    }

    let (x, labels) = match policy {
        NoisePolicy::AsCluster => (x.clone(), labels.clone()),
        NoisePolicy::Exclude => {
            let keep: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] != NOISE).collect();
            (
                x.select(Axis(0), &keep),
                keep.iter().map(|&i| labels[i]).collect(),
            )
        }
    };

    let record = EvaluationRecord {
        algorithm,
        silhouette: silhouette_score(&x, &labels),
        davies_bouldin: davies_bouldin_score(&x, &labels),
        calinski_harabasz: calinski_harabasz_score(&x, &labels),
    };

    if record.is_defined() {
        info!(
            "{} evaluation: silhouette={:.4?} davies_bouldin={:.4?} calinski_harabasz={:.4?}",
            algorithm, record.silhouette, record.davies_bouldin, record.calinski_harabasz
        );
    } else {
        info!("{} evaluation undefined: fewer than two usable clusters", algorithm);
    }
    record
}

/// Mean over samples of `(b - a) / max(a, b)`, where `a` is the mean distance
/// to the sample's own cluster and `b` the mean distance to the nearest other
/// cluster. Samples alone in their cluster score 0.
pub fn silhouette_score(x: &Matrix, labels: &Labels) -> Option<f64> {
    let groups = Groups::new(x, labels)?;
    let n = x.nrows();
    let k = groups.count();

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[groups.index[j]] += euclidean(&x.row(i), &x.row(j));
            }
        }

        let own = groups.index[i];
        if groups.sizes[own] <= 1 {
            continue;
        }
        let a = sums[own] / (groups.sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own)
            .map(|c| sums[c] / groups.sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denominator = a.max(b);
        if denominator > 0.0 {
            total += (b - a) / denominator;
        }
    }

    let score = total / n as f64;
    debug!("silhouette over {} samples and {} clusters: {:.4}", n, k, score);
    Some(score)
}

/// Mean over clusters of the worst `(s_i + s_j) / d(c_i, c_j)` ratio, where
/// `s` is the mean distance of members to their centroid. Lower is better.
pub fn davies_bouldin_score(x: &Matrix, labels: &Labels) -> Option<f64> {
    let groups = Groups::new(x, labels)?;
    let k = groups.count();
    let centroids = groups.centroids(x);

    let mut scatter = Vector::zeros(k);
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        let c = groups.index[i];
        scatter[c] += euclidean(&row, &centroids.row(c));
    }
    for c in 0..k {
        scatter[c] /= groups.sizes[c] as f64;
    }

    let mut total = 0.0;
    for a in 0..k {
        let worst = (0..k)
            .filter(|&b| b != a)
            .map(|b| {
                let separation = euclidean(&centroids.row(a), &centroids.row(b));
                if separation > 0.0 {
                    (scatter[a] + scatter[b]) / separation
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max);
        total += worst;
    }

    Some(total / k as f64)
}

/// Between-cluster over within-cluster dispersion, scaled by `(n - k) / (k - 1)`.
pub fn calinski_harabasz_score(x: &Matrix, labels: &Labels) -> Option<f64> {
    let groups = Groups::new(x, labels)?;
    let n = x.nrows();
    let k = groups.count();
    let centroids = groups.centroids(x);
    let overall = x.mean_axis(Axis(0))?;

    let between: f64 = (0..k)
        .map(|c| groups.sizes[c] as f64 * squared_euclidean(&centroids.row(c), &overall.view()))
        .sum();
    let within: f64 = x
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| squared_euclidean(&row, &centroids.row(groups.index[i])))
        .sum();

    if within == 0.0 {
        return Some(1.0);
    }
    Some(between * (n - k) as f64 / (within * (k - 1) as f64))
}

struct Groups {
    index: Vec<usize>,
    sizes: Vec<usize>,
}

impl Groups {
    fn new(x: &Matrix, labels: &Labels) -> Option<Self> {
        if x.nrows() != labels.len() {
            return None;
        }
        let mut ids: BTreeMap<i32, usize> = BTreeMap::new();
        for &label in labels.iter() {
            let next = ids.len();
            ids.entry(label).or_insert(next);
        }
        let k = ids.len();
        if k < 2 || k >= x.nrows() {
            return None;
        }

        let index: Vec<usize> = labels.iter().map(|label| ids[label]).collect();
        let mut sizes = vec![0; k];
        for &c in &index {
            sizes[c] += 1;
        }
        Some(Self { index, sizes })
    }

    fn count(&self) -> usize {
        self.sizes.len()
    }

    fn centroids(&self, x: &Matrix) -> Matrix {
        let mut centroids = Matrix::zeros((self.count(), x.ncols()));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let mut centroid = centroids.row_mut(self.index[i]);
            centroid += &row;
        }
        for (c, mut centroid) in centroids.axis_iter_mut(Axis(0)).enumerate() {
            centroid /= self.sizes[c] as f64;
        }
        centroids
    }
}
