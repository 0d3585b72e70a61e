//! Read-only outputs of a training run for presentation.

use crate::dataset::Dataset;
use crate::error::{ClusterError, Result};
use crate::metrics::EvaluationRecord;
use crate::selection::KSearch;
use crate::{Labels, Matrix, NOISE};
use ndarray::Axis;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub pc1: f64,
    pub pc2: f64,
    pub cluster: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSize {
    pub cluster: i32,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CenterRow {
    pub cluster: usize,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CenterTable {
    pub features: Vec<String>,
    pub rows: Vec<CenterRow>,
}

impl CenterTable {
    pub fn new(features: &[String], centers: &Matrix) -> Self {
        Self {
            features: features.to_vec(),
            rows: centers
                .axis_iter(Axis(0))
                .enumerate()
                .map(|(cluster, row)| CenterRow {
                    cluster,
                    values: row.to_vec(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingReport {
    pub features: Vec<String>,
    pub k_search: KSearch,
    pub evaluation: EvaluationRecord,
    pub projection: Vec<ProjectedPoint>,
    pub explained_variance_ratio: Vec<f64>,
    pub cluster_sizes: Vec<ClusterSize>,
    pub centers: Option<CenterTable>,
    pub interpretation: Vec<String>,
}

impl TrainingReport {
    pub fn new(
        features: &[String],
        k_search: KSearch,
        evaluation: EvaluationRecord,
        projected: &Matrix,
        explained_variance_ratio: Vec<f64>,
        labels: &Labels,
        centers: Option<&Matrix>,
    ) -> Result<Self> {
        if projected.nrows() != labels.len() || projected.ncols() < 2 {
            return Err(ClusterError::invalid_parameter(format!(
                "projection of shape {:?} does not match {} labels",
                projected.dim(),
                labels.len()
            )));
        }

        let projection = projected
            .axis_iter(Axis(0))
            .zip(labels.iter())
            .map(|(row, &cluster)| ProjectedPoint {
                pc1: row[0],
                pc2: row[1],
                cluster,
            })
            .collect();
        let cluster_sizes = cluster_sizes(labels);
        let interpretation = cluster_sizes.iter().map(describe_cluster).collect();

        Ok(Self {
            features: features.to_vec(),
            k_search,
            evaluation,
            projection,
            explained_variance_ratio,
            cluster_sizes,
            centers: centers.map(|c| CenterTable::new(features, c)),
            interpretation,
        })
    }
}

/// Observation count per label, ascending by label (noise first).
pub fn cluster_sizes(labels: &Labels) -> Vec<ClusterSize> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &label in labels.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(cluster, count)| ClusterSize { cluster, count })
        .collect()
}

fn describe_cluster(size: &ClusterSize) -> String {
    if size.cluster == NOISE {
        format!(
            "Noise: {} observations lie outside every dense region and belong to no cluster.",
            size.count
        )
    } else {
        format!(
            "Cluster {}: {} observations with relatively similar numeric characteristics, \
             usable as a basis for further analysis of climate patterns and environmental risk.",
            size.cluster, size.count
        )
    }
}

fn csv_field(name: &str) -> String {
    if name.contains(',') || name.contains('"') {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

fn write_header<W: Write>(writer: &mut W, features: &[String]) -> Result<()> {
    let header: Vec<String> = features
        .iter()
        .map(|f| csv_field(f))
        .chain(std::iter::once("cluster".to_string()))
        .collect();
    writeln!(writer, "{}", header.join(","))?;
    Ok(())
}

pub fn write_labeled_csv<W: Write>(writer: &mut W, dataset: &Dataset, labels: &Labels) -> Result<()> {
    if dataset.n_samples() != labels.len() {
        return Err(ClusterError::invalid_parameter(format!(
            "{} labels for {} observations",
            labels.len(),
            dataset.n_samples()
        )));
    }
    write_header(writer, &dataset.feature_names)?;
    for (row, label) in dataset.features.axis_iter(Axis(0)).zip(labels.iter()) {
        let mut fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        fields.push(label.to_string());
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_centers_csv<W: Write>(writer: &mut W, table: &CenterTable) -> Result<()> {
    write_header(writer, &table.features)?;
    for row in &table.rows {
        let mut fields: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        fields.push(row.cluster.to_string());
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    Ok(())
}
