//! Persisted experiment state
//!
//! A training run writes three JSON files keyed by proportion, epoch count
//! and run id: per-epoch prediction matrices and the two pair x epoch error
//! curves. The report stage reads them back.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::evaluation::reconstruct::EpochEstimates;
use crate::{JesterError, Proportion, Result};

/// Identifies one training run's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub proportion: Proportion,
    pub epochs: usize,
    pub run_id: String,
}

impl ArtifactKey {
    pub fn new(proportion: Proportion, epochs: usize, run_id: impl Into<String>) -> Self {
        ArtifactKey {
            proportion,
            epochs,
            run_id: run_id.into(),
        }
    }

    /// Key stamped with the current time as lowercase hex seconds
    pub fn now(proportion: Proportion, epochs: usize) -> Self {
        let seconds = chrono::Utc::now().timestamp();
        Self::new(proportion, epochs, format!("{:x}", seconds))
    }

    fn file_name(&self, kind: &str) -> String {
        format!(
            "{}_{}_{}_{}.json",
            kind,
            self.proportion.percent(),
            self.epochs,
            self.run_id
        )
    }

    pub fn estimates_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name("ests"))
    }

    pub fn train_curve_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name("mae_tr"))
    }

    pub fn val_curve_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name("mae_va"))
    }
}

/// Everything a report needs from a finished training run
#[derive(Debug, Clone)]
pub struct ExperimentArtifacts {
    pub estimates: EpochEstimates,
    /// Training MAE: [pairs, epochs]
    pub train_curve: Array2<f64>,
    /// Validation MAE: [pairs, epochs]
    pub val_curve: Array2<f64>,
}

impl ExperimentArtifacts {
    pub fn save(&self, dir: &Path, key: &ArtifactKey) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json(&key.estimates_path(dir), &self.estimates)?;
        write_json(&key.train_curve_path(dir), &self.train_curve)?;
        write_json(&key.val_curve_path(dir), &self.val_curve)?;
        log::info!("Saved artifacts for run {} to {}", key.run_id, dir.display());
        Ok(())
    }

    pub fn load(dir: &Path, key: &ArtifactKey) -> Result<Self> {
        let estimates: EpochEstimates = read_json(&key.estimates_path(dir))?;
        let train_curve: Array2<f64> = read_json(&key.train_curve_path(dir))?;
        let val_curve: Array2<f64> = read_json(&key.val_curve_path(dir))?;

        let artifacts = ExperimentArtifacts {
            estimates,
            train_curve,
            val_curve,
        };
        artifacts.check_shapes(key)?;
        Ok(artifacts)
    }

    /// Curves and matrices must agree on pair and epoch counts
    fn check_shapes(&self, key: &ArtifactKey) -> Result<()> {
        let expected = (key.proportion.pair_count(), key.epochs);
        if self.train_curve.dim() != expected || self.val_curve.dim() != expected {
            return Err(JesterError::DataIntegrity(format!(
                "Error curves shaped {:?} / {:?}, expected {:?}",
                self.train_curve.dim(),
                self.val_curve.dim(),
                expected
            )));
        }
        if self.estimates.matrices.len() != key.epochs {
            return Err(JesterError::DataIntegrity(format!(
                "Found {} prediction matrices for {} epochs",
                self.estimates.matrices.len(),
                key.epochs
            )));
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), value)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path).map_err(|e| JesterError::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| JesterError::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
