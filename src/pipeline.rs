use crate::bundle::{BundleStore, ModelBundle};
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::decomposition::Pca;
use crate::error::Result;
use crate::metrics::evaluate;
use crate::preprocessing::StandardScaler;
use crate::report::TrainingReport;
use crate::selection::search_k;
use crate::trainer::train;
use crate::Labels;
use tracing::info;

#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub bundle: ModelBundle,
    pub labels: Labels,
}

/// The bundle is only written once every earlier stage has succeeded.
pub fn train_pipeline<S: BundleStore + ?Sized>(
    dataset: &Dataset,
    config: &PipelineConfig,
    store: &S,
) -> Result<TrainingOutcome> {
    config.validate()?;
    info!(
        "Training {} on {} observations x {} features",
        config.algorithm,
        dataset.n_samples(),
        dataset.n_features()
    );

    let mut scaler = StandardScaler::new().feature_names(&dataset.feature_names);
    let scaled = scaler.fit_transform(&dataset.features)?;

    let k_search = search_k(
        &scaled,
        config.k_min,
        config.k_max,
        &config.model.kmeans,
        config.model.seed,
    )?;
    let best_k = k_search.best_k;

    let trained = train(config.algorithm, &scaled, best_k, &config.model)?;
    let evaluation = evaluate(&scaled, &trained.labels, config.algorithm, config.noise_policy);

    let mut projector = Pca::new(2);
    let projected = projector.fit_transform(&scaled)?;
    let explained = projector
        .explained_variance_ratio
        .as_ref()
        .map(|r| r.to_vec())
        .unwrap_or_default();

    let report = TrainingReport::new(
        &dataset.feature_names,
        k_search,
        evaluation,
        &projected,
        explained,
        &trained.labels,
        trained.centers.as_ref(),
    )?;

    let bundle = ModelBundle {
        algorithm: config.algorithm,
        model: trained.model,
        scaler,
        projector,
        best_k,
        features: dataset.feature_names.clone(),
    };
    store.save(&bundle)?;

    Ok(TrainingOutcome {
        report,
        bundle,
        labels: trained.labels,
    })
}
