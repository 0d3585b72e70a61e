//! Dimensionality reduction for visualizing the scaled feature space.
//!
//! # Examples
//!
//! ```rust
//! use climclust::decomposition::Pca;
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 2.0, 3.0],
//!     [4.0, 5.0, 7.0],
//!     [7.0, 8.0, 8.0]
//! ];
//!
//! let mut pca = Pca::new(2);
//! let projected = pca.fit_transform(&x).unwrap();
//! assert_eq!(projected.ncols(), 2);
//! ```

mod pca;

pub use pca::Pca;
