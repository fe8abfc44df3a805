use olm_core::errors::{ErrorInfo, OlmError};

use crate::trajectory::Trajectory;

fn map_err(err: serde_json::Error, code: &str) -> OlmError {
    OlmError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Serialises a trajectory to pretty JSON.
pub fn trajectory_to_json(trajectory: &Trajectory) -> Result<String, OlmError> {
    serde_json::to_string_pretty(trajectory).map_err(|err| map_err(err, "trajectory-serialize"))
}

/// Restores a trajectory from JSON, re-checking position ordering.
pub fn trajectory_from_json(json: &str) -> Result<Trajectory, OlmError> {
    serde_json::from_str(json).map_err(|err| map_err(err, "trajectory-deserialize"))
}
