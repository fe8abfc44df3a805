use std::f64::consts::TAU;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::species::VACUUM_PERMITTIVITY;
use olm_core::{CovarianceMatrix, PhaseIndex, PhaseMap, PhaseMatrix, Species, Twiss};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;
use crate::state::StateData;

/// Covariance envelope with the beam current driving space charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    /// Second moments including the centroid.
    pub covariance: CovarianceMatrix,
    /// Product of every linear map applied so far.
    #[serde(default)]
    pub response: PhaseMatrix,
    /// Beam current (A).
    #[serde(default)]
    pub current: f64,
    /// Bunch frequency (Hz).
    #[serde(default = "default_bunch_frequency")]
    pub bunch_frequency: f64,
    #[serde(skip)]
    twiss: Option<[Twiss; 3]>,
}

pub(crate) fn default_bunch_frequency() -> f64 {
    402.5e6
}

pub(crate) fn check_current(current: f64, bunch_frequency: f64) -> Result<(), OlmError> {
    if !(current >= 0.0) || !current.is_finite() {
        return Err(OlmError::Config(
            ErrorInfo::new("beam-current", "beam current must be non-negative")
                .with_context("current", current.to_string()),
        ));
    }
    if !(bunch_frequency > 0.0) || !bunch_frequency.is_finite() {
        return Err(OlmError::Config(
            ErrorInfo::new("bunch-frequency", "bunch frequency must be positive")
                .with_context("bunch_frequency", bunch_frequency.to_string()),
        ));
    }
    Ok(())
}

/// Generalized perveance `K = |q|·Q / (2π ε₀ E_r β² γ³)` of a bunch of charge `Q` (C).
pub(crate) fn generalized_perveance(species: &Species, bunch_charge: f64) -> f64 {
    if bunch_charge == 0.0 {
        return 0.0;
    }
    let beta = species.beta();
    let gamma = species.gamma();
    species.charge.abs() * bunch_charge
        / (TAU * VACUUM_PERMITTIVITY * species.rest_energy * beta * beta * gamma.powi(3))
}

impl EnvelopeProbe {
    /// Envelope with zero current; use [`EnvelopeProbe::with_current`] for space charge.
    pub fn new(species: Species, covariance: CovarianceMatrix) -> Self {
        let twiss = covariance.twiss().ok();
        Self {
            core: ProbeCore::new(species),
            covariance,
            response: PhaseMatrix::identity(),
            current: 0.0,
            bunch_frequency: default_bunch_frequency(),
            twiss,
        }
    }

    /// Sets the beam current (A) and bunch frequency (Hz).
    pub fn with_current(mut self, current: f64, bunch_frequency: f64) -> Result<Self, OlmError> {
        check_current(current, bunch_frequency)?;
        self.current = current;
        self.bunch_frequency = bunch_frequency;
        Ok(self)
    }

    /// Charge per bunch `Q = I / f` (C).
    pub fn bunch_charge(&self) -> f64 {
        self.current / self.bunch_frequency
    }

    /// Generalized perveance `K = |q|·Q / (2π ε₀ E_r β² γ³)` (m).
    pub fn perveance(&self) -> f64 {
        generalized_perveance(&self.core.species, self.bunch_charge())
    }

    /// Twiss parameters cached at the last refresh; `None` for a zero-emittance plane.
    pub fn twiss(&self) -> Option<[Twiss; 3]> {
        self.twiss
    }

    pub(crate) fn refresh(&mut self) {
        self.twiss = self.covariance.twiss().ok();
    }

    pub(crate) fn advance(&mut self, map: &PhaseMap) -> Result<(), OlmError> {
        let matrix = map.linear_part();
        self.covariance = self.covariance.transform(matrix)?;
        self.response = matrix.times(&self.response)?;
        Ok(())
    }

    pub(crate) fn apply_space_charge(&mut self, kick: &PhaseMatrix) -> Result<(), OlmError> {
        self.covariance = self.covariance.transform(kick)?;
        self.response = kick.times(&self.response)?;
        Ok(())
    }

    /// Adds `k·<uu>` to `<u'u'>` in each plane, using central moments.
    pub(crate) fn apply_phase_spread(&mut self, growth: &[f64; 3]) -> Result<(), OlmError> {
        use PhaseIndex::*;
        let mut matrix = *self.covariance.as_matrix();
        for ((pos, div), k) in [(X, XP), (Y, YP), (Z, ZP)].into_iter().zip(growth) {
            let grown = matrix.get(div, div) + k * self.covariance.central_moment(pos, pos);
            matrix.set(div, div, grown);
        }
        self.covariance = CovarianceMatrix::new(matrix)?;
        Ok(())
    }

    pub(crate) fn state_data(&self) -> StateData {
        StateData::Envelope {
            covariance: self.covariance,
            response: self.response,
            twiss: self.covariance.twiss().ok(),
        }
    }
}
