//! Error types for the clustering pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse grouping of [`ClusterError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Configuration,
    DataQuality,
    Persistence,
    InferenceSupport,
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Dataset must contain at least two numeric columns, found {found}")]
    TooFewFeatures { found: usize },

    #[error("Dataset has no complete numeric rows")]
    EmptyDataset,

    #[error("Feature mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("Invalid observation: {message}")]
    InvalidObservation { message: String },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid cluster count range: k_min={k_min}, k_max={k_max}")]
    InvalidKRange { k_min: usize, k_max: usize },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Column '{column}' has zero variance")]
    DegenerateColumn { column: String },

    #[error("Insufficient data: required {required}, actual {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("No cluster count in {k_min}..={k_max} produced a defined silhouette")]
    NoDefinedScore { k_min: usize, k_max: usize },

    #[error("No model bundle found at {0}")]
    BundleNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Inconsistent model bundle: {message}")]
    InconsistentBundle { message: String },

    #[error("Model '{algorithm}' supports neither native prediction nor nearest-center assignment")]
    NoInferenceSupport { algorithm: String },
}

impl ClusterError {
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn csv(line: usize, message: impl Into<String>) -> Self {
        Self::Csv {
            line,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooFewFeatures { .. }
            | Self::EmptyDataset
            | Self::FeatureMismatch { .. }
            | Self::Csv { .. }
            | Self::InvalidObservation { .. } => ErrorKind::Input,
            Self::UnsupportedAlgorithm(_)
            | Self::InvalidKRange { .. }
            | Self::InvalidParameter { .. } => ErrorKind::Configuration,
            Self::DegenerateColumn { .. }
            | Self::InsufficientData { .. }
            | Self::NoDefinedScore { .. } => ErrorKind::DataQuality,
            Self::BundleNotFound(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::InconsistentBundle { .. } => ErrorKind::Persistence,
            Self::NoInferenceSupport { .. } => ErrorKind::InferenceSupport,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
