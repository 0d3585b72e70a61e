use climclust::{
    train_pipeline, Algorithm, BundleStore, ClusterError, Dataset, ErrorKind, JsonFileStore,
    Matrix, PipelineConfig, Predictor, StandardScaler,
};
use ndarray::{concatenate, Axis};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::TempDir;

/// 100 observations; "a" is strongly bimodal (modes 0 and 10), "b" shifts with it.
fn bimodal_dataset(seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();

    let low = Matrix::random_using((50, 2), noise, &mut rng);
    let mut high = Matrix::random_using((50, 2), noise, &mut rng);
    high.column_mut(0).mapv_inplace(|v| v + 10.0);
    high.column_mut(1).mapv_inplace(|v| v + 4.0);

    let features = concatenate(Axis(0), &[low.view(), high.view()]).unwrap();
    Dataset::new(vec!["a".to_string(), "b".to_string()], features).unwrap()
}

fn store_in(dir: &TempDir) -> JsonFileStore {
    JsonFileStore::new(dir.path().join("clustering_model.json"))
}

fn observation(a: f64, b: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([("a".to_string(), a), ("b".to_string(), b)])
}

#[test]
fn bimodal_data_selects_two_clusters() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        k_min: 2,
        k_max: 6,
        ..PipelineConfig::default()
    };

    let outcome = train_pipeline(&bimodal_dataset(7), &config, &store_in(&dir)).unwrap();
    let report = &outcome.report;

    assert_eq!(report.k_search.best_k, 2);
    assert_eq!(report.k_search.scores.len(), 5);
    let silhouette = report.evaluation.silhouette.unwrap();
    assert!(silhouette > 0.5, "silhouette {}", silhouette);
    assert_eq!(report.cluster_sizes.len(), 2);
    assert!(report.cluster_sizes.iter().all(|s| s.count == 50));
    assert_eq!(report.projection.len(), 100);
    assert_eq!(report.centers.as_ref().map(|t| t.rows.len()), Some(2));
}

#[test]
fn saved_bundle_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let outcome = train_pipeline(&bimodal_dataset(7), &PipelineConfig::default(), &store).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, outcome.bundle);
    assert_eq!(loaded.features, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(loaded.best_k, 2);
}

#[test]
fn training_is_deterministic() {
    let dataset = bimodal_dataset(11);
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let config = PipelineConfig {
        algorithm: Algorithm::GaussianMixture,
        ..PipelineConfig::default()
    };
    let first = train_pipeline(&dataset, &config, &store_in(&first_dir)).unwrap();
    let second = train_pipeline(&dataset, &config, &store_in(&second_dir)).unwrap();

    assert_eq!(first.report, second.report);
    assert_eq!(first.bundle, second.bundle);
}

#[test]
fn prediction_reproduces_training_assignment() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let dataset = bimodal_dataset(7);
    let outcome = train_pipeline(&dataset, &PipelineConfig::default(), &store).unwrap();

    let predictor = Predictor::new(store.load().unwrap());
    for i in [0, 25, 60, 99] {
        let row = dataset.features.row(i);
        let prediction = predictor.predict(&observation(row[0], row[1])).unwrap();
        assert_eq!(prediction.cluster as i32, outcome.labels[i]);
        assert_eq!(prediction.characterization.len(), 2);
    }
}

#[test]
fn hierarchical_bundle_cannot_predict() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let config = PipelineConfig {
        algorithm: Algorithm::Agglomerative,
        ..PipelineConfig::default()
    };
    train_pipeline(&bimodal_dataset(7), &config, &store).unwrap();

    let predictor = Predictor::new(store.load().unwrap());
    let err = predictor.predict(&observation(1.0, 1.0)).unwrap_err();

    assert!(matches!(err, ClusterError::NoInferenceSupport { .. }));
    assert_eq!(err.kind(), ErrorKind::InferenceSupport);
}

#[test]
fn density_bundle_cannot_predict() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let config = PipelineConfig {
        algorithm: Algorithm::Dbscan,
        ..PipelineConfig::default()
    };
    let outcome = train_pipeline(&bimodal_dataset(7), &config, &store).unwrap();
    assert!(outcome.report.centers.is_none());

    let err = Predictor::new(store.load().unwrap())
        .predict(&observation(0.0, 0.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InferenceSupport);
}

#[test]
fn missing_feature_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    train_pipeline(&bimodal_dataset(7), &PipelineConfig::default(), &store).unwrap();
    let predictor = Predictor::new(store.load().unwrap());

    let partial = BTreeMap::from([("a".to_string(), 3.0)]);
    let err = predictor.predict(&partial).unwrap_err();

    match &err {
        ClusterError::FeatureMismatch { missing, .. } => assert_eq!(missing, &vec!["b".to_string()]),
        other => panic!("expected FeatureMismatch, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn too_few_observations_for_k_range() {
    let dir = TempDir::new().unwrap();
    let dataset = Dataset::new(
        vec!["a".to_string(), "b".to_string()],
        ndarray::array![[0.0, 1.0], [1.0, 0.5], [2.0, 3.0], [5.0, 4.0]],
    )
    .unwrap();

    let err = train_pipeline(&dataset, &PipelineConfig::default(), &store_in(&dir)).unwrap_err();
    assert!(matches!(err, ClusterError::InsufficientData { required: 6, actual: 4 }));
    assert!(!dir.path().join("clustering_model.json").exists());
}

#[test]
fn scaled_columns_are_standardized() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for (rows, cols) in [(2, 2), (17, 3), (250, 5)] {
        let x = Matrix::random_using((rows, cols), Normal::new(40.0, 12.0).unwrap(), &mut rng);
        let scaled = StandardScaler::new().fit_transform(&x).unwrap();

        for column in scaled.columns() {
            assert!(column.mean().unwrap().abs() < 1e-10);
            assert!((column.std(0.0) - 1.0).abs() < 1e-10);
        }
    }
}

#[test]
fn trains_from_csv_file() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("regions.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "region,rainfall,temperature").unwrap();
    for i in 0..12 {
        let (rain, temp) = if i % 2 == 0 { (100.0, 20.0) } else { (300.0, 31.0) };
        writeln!(file, "R{},{},{}", i, rain + i as f64, temp + 0.1 * i as f64).unwrap();
    }
    writeln!(file, "R12,NA,25.0").unwrap();
    drop(file);

    let dataset = Dataset::from_csv_path(&csv_path).unwrap();
    assert_eq!(dataset.dropped_columns(), &["region".to_string()]);
    assert_eq!(dataset.dropped_rows(), 1);

    let outcome = train_pipeline(&dataset, &PipelineConfig::default(), &store_in(&dir)).unwrap();
    assert_eq!(outcome.report.k_search.best_k, 2);
    assert_eq!(outcome.bundle.features, vec!["rainfall", "temperature"]);
}
