//! Persistence of a trained pipeline as one unit.
//!
//! A [`ModelBundle`] holds everything inference needs: the fitted model, the
//! scaler and projector fitted on the same data, the chosen cluster count and
//! the ordered feature names. [`JsonFileStore`] keeps exactly one bundle on
//! disk and replaces it atomically, so a reader never observes a partial write
//! and a failed save leaves the previous bundle in place.

use crate::cluster::{Algorithm, FittedModel};
use crate::decomposition::Pca;
use crate::error::{ClusterError, Result};
use crate::preprocessing::StandardScaler;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub algorithm: Algorithm,
    pub model: FittedModel,
    pub scaler: StandardScaler,
    pub projector: Pca,
    pub best_k: usize,
    pub features: Vec<String>,
}

impl ModelBundle {
    /// Checks that the parts were fitted together on the same feature set.
    pub fn validate(&self) -> Result<()> {
        if self.model.algorithm() != self.algorithm {
            return Err(inconsistent(format!(
                "bundle declares {} but carries a {} model",
                self.algorithm,
                self.model.algorithm()
            )));
        }
        if self.features.len() < 2 {
            return Err(ClusterError::TooFewFeatures {
                found: self.features.len(),
            });
        }
        let scaled = self.scaler.mean().map(|m| m.len());
        if scaled != Some(self.features.len()) {
            return Err(inconsistent(format!(
                "scaler covers {:?} features, bundle lists {}",
                scaled,
                self.features.len()
            )));
        }
        let projected = self.projector.mean.as_ref().map(|m| m.len());
        if projected != Some(self.features.len()) {
            return Err(inconsistent(format!(
                "projector covers {:?} features, bundle lists {}",
                projected,
                self.features.len()
            )));
        }
        let components = self.projector.components.as_ref().map(|c| c.nrows());
        if components != Some(2) {
            return Err(inconsistent(format!(
                "projector must have 2 components, has {:?}",
                components
            )));
        }
        if let Some(centers) = self.model.centers() {
            if centers.ncols() != self.features.len() {
                return Err(inconsistent(format!(
                    "model centers have {} columns, bundle lists {} features",
                    centers.ncols(),
                    self.features.len()
                )));
            }
        }
        Ok(())
    }
}

fn inconsistent(message: String) -> ClusterError {
    ClusterError::InconsistentBundle { message }
}

pub trait BundleStore {
    /// Replaces any previously saved bundle.
    fn save(&self, bundle: &ModelBundle) -> Result<()>;

    fn load(&self) -> Result<ModelBundle>;
}

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BundleStore for JsonFileStore {
    fn save(&self, bundle: &ModelBundle) -> Result<()> {
        bundle.validate()?;
        let temp_path = self.temp_path();

        let written = (|| -> Result<()> {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, bundle)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &self.path)?;
        info!(
            "Saved {} bundle (k={}) to {}",
            bundle.algorithm,
            bundle.best_k,
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Result<ModelBundle> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClusterError::BundleNotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let bundle: ModelBundle = serde_json::from_str(&text)?;
        bundle.validate()?;
        debug!(
            "Loaded {} bundle with features {:?} from {}",
            bundle.algorithm,
            bundle.features,
            self.path.display()
        );
        Ok(bundle)
    }
}
