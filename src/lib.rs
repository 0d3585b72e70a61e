pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod bundle;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod decomposition;
pub mod error;
pub mod linalg;
pub mod metrics;
pub mod pipeline;
pub mod predict;
pub mod preprocessing;
pub mod report;
pub mod selection;
pub mod trainer;

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
pub type Labels = Array1<i32>;

/// Label given by density-based clustering to points outside every cluster.
pub const NOISE: i32 = -1;

pub use bundle::{BundleStore, JsonFileStore, ModelBundle};
pub use cluster::{
    AgglomerativeClustering, Algorithm, Dbscan, FittedModel, GaussianMixture, KMeans, Linkage,
    SpectralClustering,
};
pub use config::PipelineConfig;
pub use dataset::Dataset;
pub use decomposition::Pca;
pub use error::{ClusterError, ErrorKind, Result};
pub use metrics::{EvaluationRecord, NoisePolicy};
pub use pipeline::{train_pipeline, TrainingOutcome};
pub use predict::{Prediction, Predictor, RiskTier, RiskTierPolicy};
pub use preprocessing::StandardScaler;
pub use report::TrainingReport;
pub use selection::{search_k, KSearch};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_work() {
        let vec = Vector::zeros(5);
        let mat = Matrix::zeros((3, 4));
        let labels = Labels::from(vec![0, 1, NOISE]);
        assert_eq!(vec.len(), 5);
        assert_eq!(mat.shape(), &[3, 4]);
        assert_eq!(labels[2], NOISE);
    }
}
