use crate::cluster::{
    Algorithm, AgglomerativeClustering, Dbscan, FittedModel, GaussianMixture, KMeans,
    SpectralClustering,
};
use crate::config::ModelParams;
use crate::error::{ClusterError, Result};
use crate::{Labels, Matrix, NOISE};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainedModel {
    pub model: FittedModel,
    pub labels: Labels,
    pub centers: Option<Matrix>,
}

impl TrainedModel {
    pub fn n_clusters(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&label| label != NOISE)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn n_noise(&self) -> usize {
        self.labels.iter().filter(|&&label| label == NOISE).count()
    }
}

/// Fits `algorithm` on the scaled matrix. `k` is ignored by DBSCAN.
pub fn train(algorithm: Algorithm, x: &Matrix, k: usize, params: &ModelParams) -> Result<TrainedModel> {
    let model = match algorithm {
        Algorithm::KMeans => {
            let mut model = KMeans::new(k)
                .max_iter(params.kmeans.max_iter)
                .n_init(params.kmeans.n_init)
                .tolerance(params.kmeans.tolerance)
                .random_state(params.seed);
            model.fit(x)?;
            FittedModel::KMeans(model)
        }
        Algorithm::Agglomerative => {
            let mut model = AgglomerativeClustering::new(k).linkage(params.linkage);
            model.fit(x)?;
            FittedModel::Agglomerative(model)
        }
        Algorithm::GaussianMixture => {
            let mut model = GaussianMixture::new(k)
                .max_iter(params.gmm.max_iter)
                .tolerance(params.gmm.tolerance)
                .reg_covar(params.gmm.reg_covar)
                .random_state(params.seed);
            model.fit(x)?;
            FittedModel::GaussianMixture(model)
        }
        Algorithm::Spectral => {
            let mut model = SpectralClustering::new(k)
                .gamma(params.spectral.gamma)
                .random_state(params.seed);
            model.fit(x)?;
            FittedModel::Spectral(model)
        }
        Algorithm::Dbscan => {
            let mut model = Dbscan::new(params.dbscan.eps, params.dbscan.min_samples);
            model.fit(x)?;
            FittedModel::Dbscan(model)
        }
    };

    let labels = model
        .labels()
        .cloned()
        .ok_or_else(|| ClusterError::invalid_parameter(format!("{} produced no labels", algorithm)))?;
    let centers = model.centers().cloned();
    let trained = TrainedModel {
        model,
        labels,
        centers,
    };

    if algorithm.uses_cluster_count() {
        info!(
            "Trained {} with k={}: {} clusters",
            algorithm,
            k,
            trained.n_clusters()
        );
    } else {
        info!(
            "Trained {}: {} clusters, {} noise points",
            algorithm,
            trained.n_clusters(),
            trained.n_noise()
        );
    }
    Ok(trained)
}

pub fn train_named(name: &str, x: &Matrix, k: usize, params: &ModelParams) -> Result<TrainedModel> {
    train(name.parse()?, x, k, params)
}
