use olm_core::Species;
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;
use crate::state::StateData;

/// Counts the elements a run has visited; maps are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    /// Number of elements visited.
    #[serde(default)]
    pub visited: u64,
}

impl DiagnosticProbe {
    /// Probe with a zero counter.
    pub fn new(species: Species) -> Self {
        Self {
            core: ProbeCore::new(species),
            visited: 0,
        }
    }

    pub(crate) fn visit(&mut self) {
        self.visited += 1;
    }

    pub(crate) fn state_data(&self) -> StateData {
        StateData::Diagnostic {
            visited: self.visited,
        }
    }
}
