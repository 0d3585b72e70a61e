//! Small dense linear-algebra kernels shared by the models.
//!
//! Everything here works on the crate's `Matrix`/`Vector` aliases and is
//! deterministic: no random restarts, fixed sweep order.

use crate::error::{ClusterError, Result};
use crate::{Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use std::cmp::Ordering;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-24;

pub(crate) fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
}

pub(crate) fn euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Index of the row of `centers` closest to `point`. Ties go to the lower index.
pub(crate) fn nearest_row(point: &ArrayView1<f64>, centers: &Matrix) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (k, center) in centers.axis_iter(Axis(0)).enumerate() {
        let distance = squared_euclidean(point, &center);
        if distance < best_distance {
            best_distance = distance;
            best = k;
        }
    }
    best
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order and the matching eigenvectors as
/// columns. Each eigenvector is sign-normalized so that its largest-magnitude
/// entry is positive, which makes the output reproducible across runs.
pub fn symmetric_eigen(matrix: &Matrix) -> Result<(Vector, Matrix)> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(ClusterError::invalid_parameter(
            "Matrix must be square for eigenvalue decomposition",
        ));
    }

    let mut a = matrix.clone();
    let mut v = Matrix::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off_diagonal <= JACOBI_TOLERANCE * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        a[[j, j]]
            .partial_cmp(&a[[i, i]])
            .unwrap_or(Ordering::Equal)
    });

    let mut eigenvalues = Vector::zeros(n);
    let mut eigenvectors = Matrix::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvalues[dst] = a[[src, src]];
        let mut column = v.column(src).to_owned();
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            column.mapv_inplace(|x| -x);
        }
        eigenvectors.column_mut(dst).assign(&column);
    }

    Ok((eigenvalues, eigenvectors))
}

pub fn cholesky(matrix: &Matrix) -> Result<Matrix> {
    let n = matrix.nrows();
    let mut l = Matrix::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(ClusterError::invalid_parameter(
                        "covariance matrix is not positive definite; increase reg_covar",
                    ));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

pub fn solve_lower(l: &Matrix, b: &ArrayView1<f64>) -> Vector {
    let n = b.len();
    let mut y = Vector::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

/// Modified Gram-Schmidt on the columns of `q`, in place.
///
/// A column that collapses to (numerically) zero is replaced by the first
/// unit vector not yet spanned, so the result always has orthonormal columns.
pub fn orthonormalize_columns(q: &mut Matrix) {
    let (n, k) = q.dim();
    for j in 0..k {
        for i in 0..j {
            let projection = q.column(i).dot(&q.column(j));
            let basis = q.column(i).to_owned();
            q.column_mut(j).scaled_add(-projection, &basis);
        }
        let mut norm = q.column(j).dot(&q.column(j)).sqrt();
        if norm < 1e-12 {
            for e in 0..n {
                let mut candidate = Vector::zeros(n);
                candidate[e] = 1.0;
                for i in 0..j {
                    let projection = q.column(i).dot(&candidate);
                    candidate.scaled_add(-projection, &q.column(i));
                }
                let candidate_norm = candidate.dot(&candidate).sqrt();
                if candidate_norm > 1e-6 {
                    q.column_mut(j).assign(&candidate);
                    norm = candidate_norm;
                    break;
                }
            }
        }
        q.column_mut(j).mapv_inplace(|x| x / norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_symmetric_eigen_diagonal() {
        let m = array![[1.0, 0.0], [0.0, 3.0]];
        let (values, vectors) = symmetric_eigen(&m).unwrap();

        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!((vectors[[1, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_eigen_reconstructs() {
        let m = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let (values, vectors) = symmetric_eigen(&m).unwrap();

        let reconstructed = vectors.dot(&Matrix::from_diag(&values)).dot(&vectors.t());
        let max_error = (&m - &reconstructed)
            .mapv(f64::abs)
            .into_iter()
            .fold(0.0, f64::max);
        assert!(max_error < 1e-9);
        assert!(values[0] >= values[1] && values[1] >= values[2]);
    }

    #[test]
    fn test_cholesky_roundtrip() {
        let m = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&m).unwrap();
        let product = l.dot(&l.t());
        assert!((&m - &product).mapv(f64::abs).sum() < 1e-12);

        let y = solve_lower(&l, &array![2.0, 1.0].view());
        let back = l.dot(&y);
        assert!((back[0] - 2.0).abs() < 1e-12);
        assert!((back[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(cholesky(&m).is_err());
    }

    #[test]
    fn test_orthonormalize_columns() {
        let mut q = array![[1.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        orthonormalize_columns(&mut q);
        let gram = q.t().dot(&q);
        assert!((gram[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((gram[[1, 1]] - 1.0).abs() < 1e-12);
        assert!(gram[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn test_nearest_row() {
        let centers = array![[0.0, 0.0], [5.0, 5.0], [10.0, 0.0]];
        assert_eq!(nearest_row(&array![4.0, 4.0].view(), &centers), 1);
        assert_eq!(nearest_row(&array![9.0, 1.0].view(), &centers), 2);
    }
}
