//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! [`PipelineConfig::from_file`] validates after loading; callers that apply
//! overrides afterwards must call [`PipelineConfig::validate`] again.

use crate::cluster::{Algorithm, Linkage};
use crate::error::{ClusterError, Result};
use crate::metrics::NoisePolicy;
use crate::predict::RiskTierPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const K_MAX_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansParams {
    pub max_iter: usize,
    pub n_init: usize,
    pub tolerance: f64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            max_iter: 300,
            n_init: 10,
            tolerance: 1e-4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmmParams {
    pub max_iter: usize,
    pub tolerance: f64,
    pub reg_covar: f64,
}

impl Default for GmmParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-3,
            reg_covar: 1e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralParams {
    pub gamma: f64,
}

impl Default for SpectralParams {
    fn default() -> Self {
        Self { gamma: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: 0.7,
            min_samples: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub seed: u64,
    pub kmeans: KMeansParams,
    pub gmm: GmmParams,
    pub spectral: SpectralParams,
    pub dbscan: DbscanParams,
    pub linkage: Linkage,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            seed: 42,
            kmeans: KMeansParams::default(),
            gmm: GmmParams::default(),
            spectral: SpectralParams::default(),
            dbscan: DbscanParams::default(),
            linkage: Linkage::Ward,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub algorithm: Algorithm,
    pub k_min: usize,
    pub k_max: usize,
    pub noise_policy: NoisePolicy,
    pub risk_tier: RiskTierPolicy,
    pub bundle_path: PathBuf,
    #[serde(flatten)]
    pub model: ModelParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::KMeans,
            k_min: 2,
            k_max: 6,
            noise_policy: NoisePolicy::AsCluster,
            risk_tier: RiskTierPolicy::CenterRank,
            bundle_path: PathBuf::from("clustering_model.json"),
            model: ModelParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_min < 2 || self.k_min > self.k_max || self.k_max > K_MAX_LIMIT {
            return Err(ClusterError::InvalidKRange {
                k_min: self.k_min,
                k_max: self.k_max,
            });
        }
        let model = &self.model;
        if model.kmeans.max_iter == 0 || model.kmeans.n_init == 0 {
            return Err(ClusterError::invalid_parameter(
                "kmeans.max_iter and kmeans.n_init must be > 0",
            ));
        }
        if model.gmm.max_iter == 0 || model.gmm.reg_covar < 0.0 {
            return Err(ClusterError::invalid_parameter(
                "gmm.max_iter must be > 0 and gmm.reg_covar >= 0",
            ));
        }
        if !(model.spectral.gamma > 0.0) {
            return Err(ClusterError::invalid_parameter("spectral.gamma must be > 0"));
        }
        if !(model.dbscan.eps > 0.0) || model.dbscan.min_samples == 0 {
            return Err(ClusterError::invalid_parameter(
                "dbscan.eps must be > 0 and dbscan.min_samples > 0",
            ));
        }
        Ok(())
    }
}
