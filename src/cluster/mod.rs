//! Clustering algorithms and the tagged model type that carries a fitted one.
//!
//! Five algorithm families are provided:
//! - [`KMeans`]: centroid-based partitioning with k-means++ seeding
//! - [`AgglomerativeClustering`]: hierarchical merging cut at `k` clusters
//! - [`GaussianMixture`]: full-covariance mixture fitted by EM
//! - [`SpectralClustering`]: normalized graph cut on an RBF affinity
//! - [`Dbscan`]: density-based clustering with a noise label
//!
//! # Examples
//!
//! ```rust
//! use climclust::cluster::{Algorithm, KMeans};
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 1.0],
//!     [1.5, 2.0],
//!     [3.0, 4.0],
//!     [5.0, 7.0],
//!     [3.5, 5.0],
//!     [4.5, 5.0]
//! ];
//!
//! let mut kmeans = KMeans::new(2).max_iter(100);
//! let labels = kmeans.fit_predict(&x).unwrap();
//! assert_eq!(labels.len(), 6);
//!
//! let algorithm: Algorithm = "Gaussian Mixture".parse().unwrap();
//! assert_eq!(algorithm, Algorithm::GaussianMixture);
//! ```

mod agglomerative;
mod dbscan;
mod gaussian_mixture;
mod kmeans;
mod spectral;

pub use agglomerative::{AgglomerativeClustering, Linkage};
pub use dbscan::Dbscan;
pub use gaussian_mixture::GaussianMixture;
pub use kmeans::KMeans;
pub use spectral::SpectralClustering;

use crate::error::ClusterError;
use crate::{Labels, Matrix};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    KMeans,
    Agglomerative,
    GaussianMixture,
    Spectral,
    Dbscan,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::KMeans,
        Algorithm::Agglomerative,
        Algorithm::GaussianMixture,
        Algorithm::Spectral,
        Algorithm::Dbscan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::KMeans => "KMeans",
            Algorithm::Agglomerative => "Agglomerative",
            Algorithm::GaussianMixture => "Gaussian Mixture",
            Algorithm::Spectral => "Spectral Clustering",
            Algorithm::Dbscan => "DBSCAN",
        }
    }

    pub fn uses_cluster_count(&self) -> bool {
        !matches!(self, Algorithm::Dbscan)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ClusterError;

    /// Accepts display names, short names and family names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "kmeans" | "centroid" | "centroidbased" => Ok(Algorithm::KMeans),
            "agglomerative" | "hierarchical" | "agglomerativeclustering" => {
                Ok(Algorithm::Agglomerative)
            }
            "gaussianmixture" | "gmm" | "mixture" | "distributionmixture" => {
                Ok(Algorithm::GaussianMixture)
            }
            "spectral" | "spectralclustering" | "graph" | "affinity" => Ok(Algorithm::Spectral),
            "dbscan" | "density" | "densitybased" => Ok(Algorithm::Dbscan),
            _ => Err(ClusterError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub native_classify: bool,
    pub centers: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state")]
pub enum FittedModel {
    KMeans(KMeans),
    Agglomerative(AgglomerativeClustering),
    GaussianMixture(GaussianMixture),
    Spectral(SpectralClustering),
    Dbscan(Dbscan),
}

impl FittedModel {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedModel::KMeans(_) => Algorithm::KMeans,
            FittedModel::Agglomerative(_) => Algorithm::Agglomerative,
            FittedModel::GaussianMixture(_) => Algorithm::GaussianMixture,
            FittedModel::Spectral(_) => Algorithm::Spectral,
            FittedModel::Dbscan(_) => Algorithm::Dbscan,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            FittedModel::KMeans(_) | FittedModel::GaussianMixture(_) => Capabilities {
                native_classify: true,
                centers: true,
            },
            FittedModel::Agglomerative(_) | FittedModel::Spectral(_) | FittedModel::Dbscan(_) => {
                Capabilities {
                    native_classify: false,
                    centers: false,
                }
            }
        }
    }

    /// Native classification of one scaled observation, for the families
    /// whose capabilities include it.
    pub fn predict_row(&self, row: &ArrayView1<f64>) -> Result<usize, ClusterError> {
        match self {
            FittedModel::KMeans(m) => m.predict_row(row),
            FittedModel::GaussianMixture(m) => m.predict_row(row),
            FittedModel::Agglomerative(_) | FittedModel::Spectral(_) | FittedModel::Dbscan(_) => {
                Err(ClusterError::NoInferenceSupport {
                    algorithm: self.algorithm().to_string(),
                })
            }
        }
    }

    /// Representative centers in scaled feature space, where the family defines them.
    pub fn centers(&self) -> Option<&Matrix> {
        match self {
            FittedModel::KMeans(m) => m.cluster_centers.as_ref(),
            FittedModel::GaussianMixture(m) => m.means.as_ref(),
            FittedModel::Agglomerative(_) | FittedModel::Spectral(_) | FittedModel::Dbscan(_) => {
                None
            }
        }
    }

    pub fn labels(&self) -> Option<&Labels> {
        match self {
            FittedModel::KMeans(m) => m.labels.as_ref(),
            FittedModel::Agglomerative(m) => m.labels.as_ref(),
            FittedModel::GaussianMixture(m) => m.labels.as_ref(),
            FittedModel::Spectral(m) => m.labels.as_ref(),
            FittedModel::Dbscan(m) => m.labels.as_ref(),
        }
    }
}
