use std::f64::consts::TAU;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{CovarianceMatrix, PhaseMap, PhaseMatrix, PhaseVector, Species, Twiss};
use serde::{Deserialize, Serialize};

use crate::envelope::{check_current, default_bunch_frequency, generalized_perveance};
use crate::probe::ProbeCore;
use crate::state::StateData;

/// Per-plane Twiss parameters, a centroid and the betatron phase advance.
///
/// Only the diagonal 2×2 blocks of each map act on the Twiss parameters, so
/// coupling between planes is dropped. The centroid sees the full map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwissProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    /// Twiss parameters of the x, y and z planes.
    pub twiss: [Twiss; 3],
    /// Beam centroid.
    #[serde(default)]
    pub centroid: PhaseVector,
    /// Product of every linear map applied so far.
    #[serde(default)]
    pub response: PhaseMatrix,
    /// Betatron phase advance of each plane (rad), wrapped into `[0, 2π)`.
    #[serde(default)]
    pub betatron_phase: [f64; 3],
    /// Beam current (A).
    #[serde(default)]
    pub current: f64,
    /// Bunch frequency (Hz).
    #[serde(default = "default_bunch_frequency")]
    pub bunch_frequency: f64,
}

impl TwissProbe {
    /// Centred probe with zero current.
    pub fn new(species: Species, twiss: [Twiss; 3]) -> Result<Self, OlmError> {
        for plane in &twiss {
            plane.validate()?;
        }
        Ok(Self {
            core: ProbeCore::new(species),
            twiss,
            centroid: PhaseVector::zero(),
            response: PhaseMatrix::identity(),
            betatron_phase: [0.0; 3],
            current: 0.0,
            bunch_frequency: default_bunch_frequency(),
        })
    }

    /// Moves the centroid off axis.
    pub fn with_centroid(mut self, centroid: PhaseVector) -> Self {
        self.centroid = centroid;
        self
    }

    /// Sets the beam current (A) and bunch frequency (Hz).
    pub fn with_current(mut self, current: f64, bunch_frequency: f64) -> Result<Self, OlmError> {
        check_current(current, bunch_frequency)?;
        self.current = current;
        self.bunch_frequency = bunch_frequency;
        Ok(self)
    }

    /// Generalized perveance of one bunch (m).
    pub fn perveance(&self) -> f64 {
        generalized_perveance(&self.core.species, self.current / self.bunch_frequency)
    }

    /// Uncoupled covariance about the centroid.
    pub fn covariance(&self) -> Result<CovarianceMatrix, OlmError> {
        let [x, y, z] = &self.twiss;
        CovarianceMatrix::from_twiss_with_centroid(x, y, z, &self.centroid)
    }

    pub(crate) fn advance(&mut self, map: &PhaseMap) -> Result<(), OlmError> {
        let matrix = map.linear_part();
        for plane in 0..3 {
            let block = matrix.block(2 * plane);
            let (twiss, advance) = transport_plane(&self.twiss[plane], block).map_err(|err| {
                err.with_context("plane", ["x", "y", "z"][plane])
            })?;
            self.twiss[plane] = twiss;
            self.betatron_phase[plane] = (self.betatron_phase[plane] + advance).rem_euclid(TAU);
        }
        self.centroid = map.apply(&self.centroid);
        self.response = matrix.times(&self.response)?;
        Ok(())
    }

    pub(crate) fn apply_space_charge(&mut self, kick: &PhaseMatrix) -> Result<(), OlmError> {
        self.advance(&PhaseMap::linear(*kick))
    }

    /// Grows each plane's `<u'u'>` by `k·<uu>`, keeping `<uu>` and `<uu'>`.
    pub(crate) fn apply_phase_spread(&mut self, growth: &[f64; 3]) {
        for (twiss, k) in self.twiss.iter_mut().zip(growth) {
            let ratio = (1.0 + k * twiss.beta * twiss.beta).sqrt();
            twiss.alpha /= ratio;
            twiss.beta /= ratio;
            twiss.emittance *= ratio;
        }
    }

    pub(crate) fn longitudinal_moment(&self) -> f64 {
        self.twiss[2].beta * self.twiss[2].emittance
    }

    pub(crate) fn state_data(&self) -> StateData {
        StateData::Twiss {
            twiss: self.twiss,
            centroid: self.centroid,
            response: self.response,
            betatron_phase: self.betatron_phase,
        }
    }
}

/// Transports one plane through the 2×2 block `r`, returning the new
/// parameters and the phase advance in `[0, 2π)`.
fn transport_plane(twiss: &Twiss, r: [[f64; 2]; 2]) -> Result<(Twiss, f64), OlmError> {
    let det = (r[0][0] * r[1][1] - r[0][1] * r[1][0]).abs();
    if !(det > 0.0) || !det.is_finite() {
        return Err(OlmError::Model(
            ErrorInfo::new("twiss-degenerate-block", "plane transfer block has zero determinant")
                .with_context("determinant", format!("{det:e}")),
        ));
    }
    let (alpha, beta, gamma) = (twiss.alpha, twiss.beta, twiss.gamma());
    // R C Rᵀ with C = [[β, −α], [−α, γ]].
    let b00 = r[0][0] * r[0][0] * beta - 2.0 * r[0][0] * r[0][1] * alpha + r[0][1] * r[0][1] * gamma;
    let b01 = r[0][0] * r[1][0] * beta - (r[0][0] * r[1][1] + r[0][1] * r[1][0]) * alpha
        + r[0][1] * r[1][1] * gamma;
    let beta1 = b00 / det;
    let alpha1 = -b01 / det;
    let sin = r[0][1] / (det * beta * beta1).sqrt();
    let cos = r[0][0] * (beta / (det * beta1)).sqrt() - alpha * sin;
    let advance = sin.atan2(cos).rem_euclid(TAU);
    Ok((Twiss::new(alpha1, beta1, twiss.emittance * det), advance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_block_follows_beta_parabola() {
        let twiss = Twiss::new(0.5, 2.0, 1e-6);
        let s = 1.5;
        let (out, advance) = transport_plane(&twiss, [[1.0, s], [0.0, 1.0]]).unwrap();
        let expected = twiss.beta - 2.0 * twiss.alpha * s + twiss.gamma() * s * s;
        assert!((out.beta - expected).abs() < 1e-12);
        assert!((out.alpha - (twiss.alpha - twiss.gamma() * s)).abs() < 1e-12);
        assert_eq!(out.emittance, 1e-6);
        let expected_advance = (s / (twiss.beta - twiss.alpha * s)).atan();
        assert!((advance - expected_advance).abs() < 1e-12);
    }

    #[test]
    fn zero_block_is_rejected() {
        let err = transport_plane(&Twiss::new(0.0, 1.0, 1e-6), [[0.0, 0.0], [0.0, 0.0]])
            .unwrap_err();
        assert_eq!(err.info().code, "twiss-degenerate-block");
    }

    #[test]
    fn phase_spread_keeps_beam_size() {
        let mut probe =
            TwissProbe::new(Species::proton(2.5e6), [Twiss::new(-1.0, 3.0, 2e-6); 3]).unwrap();
        let before = probe.twiss[0];
        probe.apply_phase_spread(&[0.1, 0.0, 0.0]);
        let after = probe.twiss[0];
        assert!((after.beta * after.emittance - before.beta * before.emittance).abs() < 1e-18);
        assert!((after.alpha * after.emittance - before.alpha * before.emittance).abs() < 1e-18);
        assert!(after.emittance > before.emittance);
        assert_eq!(probe.twiss[1], before);
    }
}
