//! Command-line front end.
//!
//! - `climclust train`: fit a clustering pipeline on a CSV file, save the bundle
//!   and print the training report as JSON.
//! - `climclust predict`: assign one observation against a saved bundle.
//!
//! Logs go to stderr (filter with `RUST_LOG`), so stdout carries only JSON.

use clap::{Parser, Subcommand};
use climclust::report::{write_centers_csv, write_labeled_csv};
use climclust::{
    train_pipeline, Algorithm, BundleStore, Dataset, JsonFileStore, PipelineConfig,
    Predictor,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "climclust")]
#[command(version)]
#[command(about = "Unsupervised clustering of regional indicator data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a clustering model and save it as a bundle
    Train {
        /// CSV file with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// KMeans, Agglomerative, "Gaussian Mixture", "Spectral Clustering" or DBSCAN
        #[arg(short, long)]
        algorithm: Option<Algorithm>,

        #[arg(long)]
        k_min: Option<usize>,

        #[arg(long)]
        k_max: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// JSON pipeline configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to write the bundle
        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// Write the data with its assigned clusters to this CSV file
        #[arg(long)]
        export_labels: Option<PathBuf>,

        /// Write the cluster centers to this CSV file, when the model has any
        #[arg(long)]
        export_centers: Option<PathBuf>,
    },
    /// Assign one observation to a cluster of a saved bundle
    Predict {
        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// JSON pipeline configuration (bundle path and risk tier policy)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Feature value as name=value; unspecified features are 0.0
        #[arg(short, long = "value", value_parser = parse_assignment)]
        values: Vec<(String, f64)>,

        /// Assign to the nearest stored center instead of the model's own rule
        #[arg(long)]
        nearest_center: bool,
    },
}

fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{}': {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

fn load_config(path: Option<&Path>) -> climclust::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn run(cli: Cli) -> climclust::Result<()> {
    match cli.command {
        Commands::Train {
            data,
            algorithm,
            k_min,
            k_max,
            seed,
            config,
            bundle,
            export_labels,
            export_centers,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(algorithm) = algorithm {
                config.algorithm = algorithm;
            }
            if let Some(k_min) = k_min {
                config.k_min = k_min;
            }
            if let Some(k_max) = k_max {
                config.k_max = k_max;
            }
            if let Some(seed) = seed {
                config.model.seed = seed;
            }
            if let Some(bundle) = bundle {
                config.bundle_path = bundle;
            }
            config.validate()?;

            let dataset = Dataset::from_csv_path(&data)?;
            let store = JsonFileStore::new(&config.bundle_path);
            let outcome = train_pipeline(&dataset, &config, &store)?;

            if let Some(path) = export_labels {
                let mut writer = BufWriter::new(File::create(&path)?);
                write_labeled_csv(&mut writer, &dataset, &outcome.labels)?;
                info!("Wrote labeled data to {}", path.display());
            }
            if let Some(path) = export_centers {
                match &outcome.report.centers {
                    Some(table) => {
                        let mut writer = BufWriter::new(File::create(&path)?);
                        write_centers_csv(&mut writer, table)?;
                        info!("Wrote cluster centers to {}", path.display());
                    }
                    None => info!("{} has no centers, nothing exported", config.algorithm),
                }
            }

            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
        Commands::Predict {
            bundle,
            config,
            values,
            nearest_center,
        } => {
            let config = load_config(config.as_deref())?;
            let path = bundle.unwrap_or(config.bundle_path);
            let bundle = JsonFileStore::new(path).load()?;

            let mut observation: BTreeMap<String, f64> = bundle
                .features
                .iter()
                .map(|name| (name.clone(), 0.0))
                .collect();
            observation.extend(values);

            let predictor = Predictor::new(bundle)
                .risk_tier_policy(config.risk_tier)
                .native_classification(!nearest_center);
            let prediction = predictor.predict(&observation)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{:?} error: {}", e.kind(), e);
        std::process::exit(1);
    }
}
