use olm_core::{CovarianceMatrix, PhaseMatrix, PhaseVector, Twiss};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;

/// Variant-specific payload of a [`ProbeState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StateData {
    /// Particle coordinates and response.
    Particle {
        /// Phase coordinates.
        state: PhaseVector,
        /// Accumulated response.
        response: PhaseMatrix,
    },
    /// Envelope moments.
    Envelope {
        /// Second moments including the centroid.
        covariance: CovarianceMatrix,
        /// Accumulated response.
        response: PhaseMatrix,
        /// Twiss parameters, absent when a plane has zero emittance.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        twiss: Option<[Twiss; 3]>,
    },
    /// Ensemble statistics.
    Ensemble {
        /// Number of macro-particles.
        count: usize,
        /// Mean coordinates.
        centroid: PhaseVector,
        /// Second moments.
        covariance: CovarianceMatrix,
    },
    /// Accumulated transfer matrix.
    TransferMap {
        /// Accumulated response.
        response: PhaseMatrix,
    },
    /// Element counter.
    Diagnostic {
        /// Elements visited so far.
        visited: u64,
    },
    /// Uncoupled Twiss parameters.
    Twiss {
        /// Twiss parameters of the x, y and z planes.
        twiss: [Twiss; 3],
        /// Beam centroid.
        centroid: PhaseVector,
        /// Accumulated response.
        response: PhaseMatrix,
        /// Betatron phase advance per plane (rad).
        betatron_phase: [f64; 3],
    },
}

/// Snapshot of a probe at one lattice position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeState {
    /// Element the state was recorded in.
    pub element_id: String,
    /// Lattice position (m).
    pub position: f64,
    /// Elapsed time (s).
    pub time: f64,
    /// Kinetic energy (eV).
    pub kinetic_energy: f64,
    /// Variant payload.
    pub data: StateData,
}

impl ProbeState {
    pub(crate) fn new(core: &ProbeCore, data: StateData) -> Self {
        Self {
            element_id: core.element_id.clone(),
            position: core.position,
            time: core.time,
            kinetic_energy: core.species.kinetic_energy,
            data,
        }
    }

    /// Phase coordinates for particle states, the centroid otherwise when available.
    pub fn centroid(&self) -> Option<PhaseVector> {
        match &self.data {
            StateData::Particle { state, .. } => Some(*state),
            StateData::Envelope { covariance, .. } => Some(covariance.mean()),
            StateData::Ensemble { centroid, .. } | StateData::Twiss { centroid, .. } => {
                Some(*centroid)
            }
            StateData::TransferMap { .. } | StateData::Diagnostic { .. } => None,
        }
    }

    /// Second moments for envelope and ensemble states.
    pub fn covariance(&self) -> Option<&CovarianceMatrix> {
        match &self.data {
            StateData::Envelope { covariance, .. } | StateData::Ensemble { covariance, .. } => {
                Some(covariance)
            }
            _ => None,
        }
    }

    /// Accumulated response, when the variant records one.
    pub fn response(&self) -> Option<&PhaseMatrix> {
        match &self.data {
            StateData::Particle { response, .. }
            | StateData::Envelope { response, .. }
            | StateData::Twiss { response, .. }
            | StateData::TransferMap { response } => Some(response),
            StateData::Ensemble { .. } | StateData::Diagnostic { .. } => None,
        }
    }
}
