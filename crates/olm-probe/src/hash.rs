use olm_core::errors::{ErrorInfo, OlmError};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::trajectory::Trajectory;

/// SHA-256 over the compact JSON encoding of `value`.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, OlmError> {
    let json = serde_json::to_vec(value)
        .map_err(|err| OlmError::Serde(ErrorInfo::new("serialize", err.to_string())))?;
    let mut hasher = Sha256::new();
    hasher.update(json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Computes the canonical hash for a whole trajectory.
pub fn hash_trajectory(trajectory: &Trajectory) -> Result<String, OlmError> {
    hash_json(trajectory)
}
