use crate::error::{ClusterError, Result};
use crate::linalg::symmetric_eigen;
use crate::{Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Principal component analysis via eigen-decomposition of the covariance matrix.
///
/// The decomposition is a fixed sequence of Jacobi rotations, so refitting on
/// the same data always yields the same components, including their signs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub components: Option<Matrix>,
    pub explained_variance: Option<Vector>,
    pub explained_variance_ratio: Option<Vector>,
    pub mean: Option<Vector>,
    n_components: usize,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
            mean: None,
            n_components,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples < 2 {
            return Err(ClusterError::insufficient_data(2, n_samples));
        }
        if self.n_components == 0 || self.n_components > n_features {
            return Err(ClusterError::invalid_parameter(format!(
                "n_components={} must be between 1 and n_features={}",
                self.n_components, n_features
            )));
        }

        let mean = x.mean_axis(Axis(0)).ok_or(ClusterError::EmptyDataset)?;
        let centered = x - &mean.view().insert_axis(Axis(0));
        let covariance = centered.t().dot(&centered) / (n_samples as f64 - 1.0);

        let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance)?;
        let total_variance = eigenvalues.iter().map(|v| v.max(0.0)).sum::<f64>();

        let mut components = Matrix::zeros((self.n_components, n_features));
        let mut explained_variance = Vector::zeros(self.n_components);
        for i in 0..self.n_components {
            components.row_mut(i).assign(&eigenvectors.column(i));
            explained_variance[i] = eigenvalues[i].max(0.0);
        }
        let explained_variance_ratio = if total_variance > 0.0 {
            &explained_variance / total_variance
        } else {
            Vector::zeros(self.n_components)
        };

        self.components = Some(components);
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);
        self.mean = Some(mean);
        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let (components, mean) = self.parameters()?;
        if x.ncols() != mean.len() {
            return Err(ClusterError::invalid_parameter(format!(
                "Number of features in X ({}) doesn't match training data ({})",
                x.ncols(),
                mean.len()
            )));
        }

        let centered = x - &mean.view().insert_axis(Axis(0));
        Ok(centered.dot(&components.t()))
    }

    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Vector> {
        let (components, mean) = self.parameters()?;
        if row.len() != mean.len() {
            return Err(ClusterError::invalid_parameter(format!(
                "Observation has {} features, projector expects {}",
                row.len(),
                mean.len()
            )));
        }
        Ok(components.dot(&(row - mean)))
    }

    pub fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }

    fn parameters(&self) -> Result<(&Matrix, &Vector)> {
        match (self.components.as_ref(), self.mean.as_ref()) {
            (Some(components), Some(mean)) => Ok((components, mean)),
            _ => Err(ClusterError::invalid_parameter(
                "PCA not fitted. Call fit() first.",
            )),
        }
    }
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_basic() {
        let x = array![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 7.0],
            [7.0, 8.0, 8.0],
            [10.0, 11.0, 12.0]
        ];

        let mut pca = Pca::new(2);
        let transformed = pca.fit_transform(&x).unwrap();

        assert_eq!(transformed.shape(), &[4, 2]);
        assert!(pca.components.is_some());
        assert!(pca.explained_variance.is_some());
        assert!(pca.mean.is_some());
    }

    #[test]
    fn test_pca_components_are_orthonormal() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.5],
            [2.2, 2.9, 0.1],
            [1.9, 2.2, 0.9],
            [3.1, 3.0, 0.3],
            [2.3, 2.7, 1.1]
        ];

        let mut pca = Pca::new(2);
        pca.fit(&x).unwrap();
        let components = pca.components.as_ref().unwrap();
        let gram = components.dot(&components.t());

        assert!((gram[[0, 0]] - 1.0).abs() < 1e-10);
        assert!((gram[[1, 1]] - 1.0).abs() < 1e-10);
        assert!(gram[[0, 1]].abs() < 1e-10);
    }

    #[test]
    fn test_pca_explained_variance() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];

        let mut pca = Pca::new(2);
        pca.fit(&x).unwrap();

        let ratio = pca.explained_variance_ratio.as_ref().unwrap();
        assert!((ratio.sum() - 1.0).abs() < 1e-10);
        assert!(ratio[0] > 0.999);
    }

    #[test]
    fn test_pca_transform_row_matches_matrix() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [-1.0, 0.5], [0.3, -1.0]];

        let mut pca = Pca::new(2);
        let transformed = pca.fit_transform(&x).unwrap();
        let row = pca.transform_row(&x.row(2)).unwrap();

        assert!((row[0] - transformed[[2, 0]]).abs() < 1e-12);
        assert!((row[1] - transformed[[2, 1]]).abs() < 1e-12);
    }

    #[test]
    fn test_pca_invalid_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut pca = Pca::new(5);

        assert!(pca.fit(&x).is_err());
    }

    #[test]
    fn test_pca_transform_without_fit() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let pca = Pca::new(2);

        assert!(pca.transform(&x).is_err());
    }

    #[test]
    fn test_pca_dimension_mismatch() {
        let x_train = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.5]];
        let x_test = array![[1.0, 2.0], [3.0, 4.0]];

        let mut pca = Pca::new(2);
        pca.fit(&x_train).unwrap();

        assert!(pca.transform(&x_test).is_err());
    }
}
