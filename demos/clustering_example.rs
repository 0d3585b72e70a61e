use climclust::cluster::Algorithm;
use climclust::config::ModelParams;
use climclust::metrics::{evaluate, NoisePolicy};
use climclust::selection::search_k;
use climclust::trainer::train;
use climclust::{Pca, StandardScaler};
use ndarray::array;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Clustering Algorithms Comparison ===\n");

    // Three regions plus a few outliers: (rainfall mm, mean temperature C)
    let x = array![
        [120.0, 21.5], [130.0, 22.0], [125.0, 21.0], [118.0, 22.4], [128.0, 21.8],
        [310.0, 27.9], [295.0, 28.4], [305.0, 28.1], [320.0, 27.6], [300.0, 28.8],
        [210.0, 33.1], [205.0, 32.6], [198.0, 33.4], [215.0, 32.9], [207.0, 33.0],
        [400.0, 18.0], [60.0, 36.0]
    ];
    println!("Dataset: {} samples, {} features\n", x.nrows(), x.ncols());

    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&x)?;

    let params = ModelParams::default();
    let search = search_k(&scaled, 2, 6, &params.kmeans, params.seed)?;
    for score in &search.scores {
        println!("k={} silhouette={:?}", score.k, score.silhouette);
    }
    println!("Selected k = {}\n", search.best_k);

    for algorithm in Algorithm::ALL {
        let trained = train(algorithm, &scaled, search.best_k, &params)?;
        let record = evaluate(&scaled, &trained.labels, algorithm, NoisePolicy::AsCluster);
        println!(
            "{:<20} clusters={} noise={} silhouette={:?} davies_bouldin={:?}",
            algorithm.name(),
            trained.n_clusters(),
            trained.n_noise(),
            record.silhouette,
            record.davies_bouldin
        );
    }

    let mut pca = Pca::new(2);
    pca.fit(&scaled)?;
    println!(
        "\nExplained variance ratio: {:?}",
        pca.explained_variance_ratio.as_ref().map(|r| r.to_vec())
    );

    Ok(())
}
