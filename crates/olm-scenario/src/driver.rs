use std::ops::Range;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_probe::{Probe, Trajectory};
use olm_track::{Tracker, TrackerConfig};
use thiserror::Error;
use tracing::{info, warn};

use crate::lattice::Lattice;

/// Failed run: the first fatal error plus every state saved before it.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct RunFailure {
    /// Error that aborted the run.
    #[source]
    pub error: OlmError,
    /// States recorded before the failure.
    pub partial: Trajectory,
}

impl From<OlmError> for RunFailure {
    fn from(error: OlmError) -> Self {
        Self {
            error,
            partial: Trajectory::new(),
        }
    }
}

/// Element index range selected by the start/stop options of `config`.
pub fn window(lattice: &Lattice, config: &TrackerConfig) -> Result<Range<usize>, OlmError> {
    let start = match &config.start_element {
        Some(id) => lattice.require(id)?,
        None => 0,
    };
    let end = match &config.stop_element {
        Some(id) => {
            let stop = lattice.require(id)?;
            if config.include_stop {
                stop + 1
            } else {
                stop
            }
        }
        None => lattice.len(),
    };
    if end < start {
        return Err(OlmError::Config(
            ErrorInfo::new("window-order", "stop element precedes start element")
                .with_context("start", config.start_element.clone().unwrap_or_default())
                .with_context("stop", config.stop_element.clone().unwrap_or_default()),
        ));
    }
    Ok(start..end)
}

/// Propagates `probe` once through the selected window of `lattice`.
///
/// Elements outside the window are skipped without touching the probe.
pub fn propagate(
    lattice: &Lattice,
    tracker: &Tracker,
    probe: &mut Probe,
) -> Result<Trajectory, RunFailure> {
    tracker.check_pairing(probe)?;
    let range = window(lattice, tracker.config())?;
    info!(
        lattice = %lattice.id(),
        probe = %probe.kind(),
        first = range.start,
        elements = range.len(),
        "run started"
    );
    let mut trajectory = Trajectory::new();
    for element in &lattice.elements()[range] {
        if let Err(error) = tracker.propagate(probe, element.as_ref(), &mut trajectory) {
            warn!(element = %element.id(), code = %error.info().code, "run aborted");
            return Err(RunFailure {
                error,
                partial: trajectory,
            });
        }
    }
    info!(states = trajectory.len(), position = probe.position(), "run finished");
    Ok(trajectory)
}
