use olm_core::errors::OlmError;
use olm_core::{PhaseMap, PhaseMatrix, Species};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;
use crate::state::StateData;

/// Accumulates `M_n ⋯ M_1` over the elements traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMapProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    /// Accumulated response.
    #[serde(default)]
    pub response: PhaseMatrix,
}

impl TransferMapProbe {
    /// Probe with an identity response.
    pub fn new(species: Species) -> Self {
        Self {
            core: ProbeCore::new(species),
            response: PhaseMatrix::identity(),
        }
    }

    pub(crate) fn advance(&mut self, map: &PhaseMap) -> Result<(), OlmError> {
        let accumulated = map.compose(&PhaseMap::linear(self.response))?;
        self.response = *accumulated.linear_part();
        Ok(())
    }

    pub(crate) fn state_data(&self) -> StateData {
        StateData::TransferMap {
            response: self.response,
        }
    }
}
