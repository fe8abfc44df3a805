use std::fs;
use std::path::{Path, PathBuf};

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{RunProvenance, SchemaVersion};
use olm_probe::hash::hash_trajectory;
use olm_probe::Trajectory;
use serde::{Deserialize, Serialize};

/// Trajectory checkpoint with its canonical hash and run provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryCheckpoint {
    /// Schema of the checkpoint payload.
    #[serde(default)]
    pub schema: SchemaVersion,
    /// Run that produced the trajectory.
    pub provenance: RunProvenance,
    /// SHA-256 of the trajectory's compact JSON encoding.
    pub trajectory_hash: String,
    /// Recorded states.
    pub trajectory: Trajectory,
}

impl TrajectoryCheckpoint {
    /// Wraps `trajectory`, computing its canonical hash.
    pub fn new(provenance: RunProvenance, trajectory: Trajectory) -> Result<Self, OlmError> {
        Ok(Self {
            schema: SchemaVersion::default(),
            provenance,
            trajectory_hash: hash_trajectory(&trajectory)?,
            trajectory,
        })
    }

    /// Restores a checkpoint from disk and re-checks its hash.
    pub fn load(path: &Path) -> Result<Self, OlmError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OlmError::Serde(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let checkpoint: Self = serde_json::from_str(&contents).map_err(|err| {
            OlmError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        checkpoint.verify()?;
        Ok(checkpoint)
    }

    /// Writes the checkpoint as pretty JSON, creating parent directories.
    pub fn store(&self, path: &Path) -> Result<(), OlmError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                OlmError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            OlmError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            OlmError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Fails when the stored hash does not match the trajectory.
    pub fn verify(&self) -> Result<(), OlmError> {
        let actual = hash_trajectory(&self.trajectory)?;
        if actual != self.trajectory_hash {
            return Err(OlmError::Serde(
                ErrorInfo::new("checkpoint-hash-mismatch", "trajectory hash does not match")
                    .with_context("expected", self.trajectory_hash.as_str())
                    .with_context("actual", actual),
            ));
        }
        Ok(())
    }
}

/// Deterministic checkpoint file name for a run label.
pub fn checkpoint_path(root: &Path, label: &str) -> PathBuf {
    root.join(format!("trajectory_{label}.json"))
}
