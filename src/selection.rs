//! Automatic choice of the cluster count.
//!
//! Every candidate `k` is probed with seeded [`KMeans`] and scored by
//! silhouette, whatever algorithm is trained afterwards. The chosen count is
//! therefore tuned for centroid-based partitions; for hierarchical, mixture or
//! graph-based models it is a reasonable default, not an optimum.

use crate::cluster::KMeans;
use crate::config::KMeansParams;
use crate::error::{ClusterError, Result};
use crate::metrics::silhouette_score;
use crate::Matrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KScore {
    pub k: usize,
    pub silhouette: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KSearch {
    pub scores: Vec<KScore>,
    pub best_k: usize,
}

/// Scores every `k` in `k_min..=k_max` and picks the best; ties go to the smaller `k`.
pub fn search_k(
    x: &Matrix,
    k_min: usize,
    k_max: usize,
    params: &KMeansParams,
    seed: u64,
) -> Result<KSearch> {
    if k_min < 2 || k_min > k_max {
        return Err(ClusterError::InvalidKRange { k_min, k_max });
    }
    if x.nrows() < k_max {
        return Err(ClusterError::insufficient_data(k_max, x.nrows()));
    }

    let score = |k: usize| -> Result<KScore> {
        let labels = KMeans::new(k)
            .max_iter(params.max_iter)
            .n_init(params.n_init)
            .tolerance(params.tolerance)
            .random_state(seed)
            .fit_predict(x)?;
        let silhouette = silhouette_score(x, &labels);
        debug!("k={} silhouette={:?}", k, silhouette);
        Ok(KScore { k, silhouette })
    };

    #[cfg(feature = "parallel")]
    let scores: Vec<KScore> = (k_min..=k_max)
        .into_par_iter()
        .map(score)
        .collect::<Result<Vec<_>>>()?;

    #[cfg(not(feature = "parallel"))]
    let scores: Vec<KScore> = (k_min..=k_max).map(score).collect::<Result<Vec<_>>>()?;

    let mut best: Option<(usize, f64)> = None;
    for entry in &scores {
        if let Some(s) = entry.silhouette {
            if best.map_or(true, |(_, best_score)| s > best_score) {
                best = Some((entry.k, s));
            }
        }
    }

    let (best_k, best_score) = best.ok_or(ClusterError::NoDefinedScore { k_min, k_max })?;
    info!(
        "Selected k={} (silhouette {:.4}) from range {}..={}",
        best_k, best_score, k_min, k_max
    );

    Ok(KSearch { scores, best_k })
}
