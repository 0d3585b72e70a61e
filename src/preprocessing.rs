use crate::error::{ClusterError, Result};
use crate::{Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Relative spread below which a column is treated as constant.
const DEGENERATE_STD: f64 = 1e-12;

/// Per-column standardization to zero mean and unit (population) variance.
///
/// Zero-variance columns are rejected at fit time with
/// [`ClusterError::DegenerateColumn`] instead of being divided by zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vector>,
    std: Option<Vector>,
    feature_names: Vec<String>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature_names(mut self, names: &[String]) -> Self {
        self.feature_names = names.to_vec();
        self
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        if data.nrows() == 0 {
            return Err(ClusterError::EmptyDataset);
        }
        let mean = data
            .mean_axis(Axis(0))
            .ok_or(ClusterError::EmptyDataset)?;
        let std = data.std_axis(Axis(0), 0.0);

        for (j, (&s, &m)) in std.iter().zip(mean.iter()).enumerate() {
            if !s.is_finite() || s <= DEGENERATE_STD * m.abs().max(1.0) {
                return Err(ClusterError::DegenerateColumn {
                    column: self.column_name(j),
                });
            }
        }

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        let (mean, std) = self.parameters()?;
        if data.ncols() != mean.len() {
            return Err(ClusterError::invalid_parameter(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                data.ncols(),
                mean.len()
            )));
        }

        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= mean;
            row /= std;
        }

        Ok(result)
    }

    /// Scales a single observation with exactly the same arithmetic as [`transform`](Self::transform).
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Vector> {
        let (mean, std) = self.parameters()?;
        if row.len() != mean.len() {
            return Err(ClusterError::invalid_parameter(format!(
                "Observation has {} values, scaler expects {}",
                row.len(),
                mean.len()
            )));
        }
        let mut scaled = row.to_owned();
        scaled -= mean;
        scaled /= std;
        Ok(scaled)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn mean(&self) -> Option<&Vector> {
        self.mean.as_ref()
    }

    pub fn std(&self) -> Option<&Vector> {
        self.std.as_ref()
    }

    fn parameters(&self) -> Result<(&Vector, &Vector)> {
        match (self.mean.as_ref(), self.std.as_ref()) {
            (Some(mean), Some(std)) => Ok((mean, std)),
            _ => Err(ClusterError::invalid_parameter(
                "Scaler not fitted. Call fit() first.",
            )),
        }
    }

    fn column_name(&self, index: usize) -> String {
        self.feature_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("column {}", index))
    }
}
