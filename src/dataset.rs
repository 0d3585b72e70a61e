//! Tabular input: reads a delimited file and keeps the complete numeric columns.
//!
//! Parsing is deliberately simple: one record per line, comma separated,
//! surrounding double quotes stripped. Quoted fields containing commas are
//! not supported.

use crate::error::{ClusterError, Result};
use crate::Matrix;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

const MISSING_MARKERS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

#[derive(Clone, Debug)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Matrix,
    dropped_columns: Vec<String>,
    dropped_rows: usize,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, features: Matrix) -> Result<Self> {
        if feature_names.len() != features.ncols() {
            return Err(ClusterError::invalid_parameter(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                features.ncols()
            )));
        }
        if features.ncols() < 2 {
            return Err(ClusterError::TooFewFeatures {
                found: features.ncols(),
            });
        }
        if features.nrows() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ClusterError::invalid_parameter(
                "features must be finite; drop incomplete rows first",
            ));
        }

        Ok(Self {
            feature_names,
            features,
            dropped_columns: Vec::new(),
            dropped_rows: 0,
        })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        info!("Loading dataset from {:?}", path.as_ref());
        Self::from_csv_reader(BufReader::new(file))
    }

    /// Parses a header row plus records, drops non-numeric columns, then drops
    /// rows with a missing value in any remaining column.
    pub fn from_csv_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break split_record(&line);
                    }
                }
                None => return Err(ClusterError::EmptyDataset),
            }
        };

        let n_columns = header.len();
        let mut cells: Vec<Vec<Option<f64>>> = Vec::new();
        let mut numeric = vec![true; n_columns];

        for (index, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = split_record(&line);
            if record.len() != n_columns {
                return Err(ClusterError::csv(
                    index + 1,
                    format!("expected {} fields, found {}", n_columns, record.len()),
                ));
            }

            let parsed: Vec<Option<f64>> = record
                .iter()
                .enumerate()
                .map(|(j, cell)| {
                    if MISSING_MARKERS.contains(&cell.as_str()) {
                        return None;
                    }
                    match cell.parse::<f64>() {
                        Ok(v) if v.is_finite() => Some(v),
                        Ok(_) => None,
                        Err(_) => {
                            numeric[j] = false;
                            None
                        }
                    }
                })
                .collect();
            cells.push(parsed);
        }

        let kept: Vec<usize> = (0..n_columns).filter(|&j| numeric[j]).collect();
        let dropped_columns: Vec<String> = (0..n_columns)
            .filter(|&j| !numeric[j])
            .map(|j| header[j].clone())
            .collect();
        if kept.len() < 2 {
            return Err(ClusterError::TooFewFeatures { found: kept.len() });
        }

        let complete: Vec<Vec<f64>> = cells
            .iter()
            .filter_map(|row| kept.iter().map(|&j| row[j]).collect::<Option<Vec<f64>>>())
            .collect();
        let dropped_rows = cells.len() - complete.len();
        if complete.is_empty() {
            return Err(ClusterError::EmptyDataset);
        }

        let mut features = Matrix::zeros((complete.len(), kept.len()));
        for (i, row) in complete.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                features[[i, j]] = value;
            }
        }

        let feature_names: Vec<String> = kept.iter().map(|&j| header[j].clone()).collect();
        debug!("Dropped non-numeric columns: {:?}", dropped_columns);
        info!(
            "Dataset ready: {} rows x {} numeric columns ({} incomplete rows dropped)",
            features.nrows(),
            features.ncols(),
            dropped_rows
        );

        Ok(Self {
            feature_names,
            features,
            dropped_columns,
            dropped_rows,
        })
    }

    pub fn select(&self, names: &[String]) -> Result<Self> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.feature_names.contains(n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ClusterError::FeatureMismatch {
                missing,
                unexpected: Vec::new(),
            });
        }

        let indices: Vec<usize> = names
            .iter()
            .filter_map(|n| self.feature_names.iter().position(|f| f == n))
            .collect();
        let features = self.features.select(ndarray::Axis(1), &indices);

        let mut selected = Self::new(names.to_vec(), features)?;
        selected.dropped_rows = self.dropped_rows;
        Ok(selected)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }
}

fn split_record(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').trim().to_string())
        .collect()
}
