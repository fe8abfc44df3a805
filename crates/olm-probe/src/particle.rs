use olm_core::errors::OlmError;
use olm_core::{PhaseMap, PhaseMatrix, PhaseVector, Species};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;
use crate::state::StateData;

/// One particle plus the response matrix accumulated since the entrance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    /// Phase coordinates relative to the reference orbit.
    pub state: PhaseVector,
    /// Product of every linear map applied so far.
    #[serde(default)]
    pub response: PhaseMatrix,
}

impl ParticleProbe {
    /// Particle at `state` with an identity response.
    pub fn new(species: Species, state: PhaseVector) -> Self {
        Self {
            core: ProbeCore::new(species),
            state,
            response: PhaseMatrix::identity(),
        }
    }

    pub(crate) fn advance(&mut self, map: &PhaseMap) -> Result<(), OlmError> {
        self.state = map.apply(&self.state);
        self.response = map.linear_part().times(&self.response)?;
        Ok(())
    }

    pub(crate) fn state_data(&self) -> StateData {
        StateData::Particle {
            state: self.state,
            response: self.response,
        }
    }
}
