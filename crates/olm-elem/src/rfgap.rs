use std::f64::consts::{PI, TAU};

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{PhaseIndex, PhaseMap, PhaseMatrix, ProbeView, LIGHT_SPEED};
use serde::{Deserialize, Serialize};

use crate::element::{check_finite, check_sub_length, Element, ElementKind};
use crate::sync::Setting;

/// Zero-length gap imparting `ΔW = q·E₀TL·cos φ`.
///
/// The longitudinal kick is `Δz' = k_z·z` with
/// `k_z = 2π·q·E₀TL·sin φ / (E_r·β²·γ²·λ)`, the transverse planes receive
/// `−k_z/2` and every divergence is damped by `(βγ)ᵢ/(βγ)_f`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfGap {
    id: String,
    voltage: Setting,
    phase: Setting,
    frequency: f64,
}

impl RfGap {
    /// Creates a gap with effective voltage (V), synchronous phase (rad) and frequency (Hz).
    pub fn new(
        id: impl Into<String>,
        voltage: f64,
        phase: f64,
        frequency: f64,
    ) -> Result<Self, OlmError> {
        let id = id.into();
        if !(frequency > 0.0) || !frequency.is_finite() {
            return Err(OlmError::model("invalid-frequency", "RF frequency must be positive")
                .with_context("element", id)
                .with_context("frequency", frequency.to_string()));
        }
        Ok(Self {
            id,
            voltage: Setting::new(voltage),
            phase: Setting::new(phase),
            frequency,
        })
    }

    /// Effective gap voltage in effect (V).
    pub fn voltage(&self) -> f64 {
        self.voltage.current()
    }

    /// Synchronous phase in effect (rad).
    pub fn phase(&self) -> f64 {
        self.phase.current()
    }

    fn gain(&self, probe: &ProbeView) -> f64 {
        probe.charge * self.voltage() * self.phase().cos()
    }
}

fn beta_gamma(rest_energy: f64, kinetic_energy: f64) -> f64 {
    let gamma = 1.0 + kinetic_energy / rest_energy;
    (gamma * gamma - 1.0).sqrt()
}

/// Trace3D transverse form factor `F(Δφ)` of a bunch with phase half-width `dphi`.
pub fn phase_spread_form_factor(dphi: f64) -> f64 {
    let d2 = dphi * dphi;
    if dphi < 0.1 {
        return 1.0 - d2 / 14.0 + d2 * d2 / 504.0;
    }
    let t = 3.0 / d2;
    let sinc = dphi.sin() / dphi;
    5.0 * t * (sinc * (t - 1.0) - dphi.cos() * t)
}

impl Element for RfGap {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::RfGap
    }

    fn length(&self) -> f64 {
        0.0
    }

    fn transfer_map(&self, probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, 0.0, sub_length)?;
        let final_energy = probe.kinetic_energy + self.gain(probe);
        if !(final_energy > 0.0) {
            return Err(OlmError::Model(
                ErrorInfo::new("gap-stops-probe", "RF gap decelerates the probe to rest")
                    .with_context("element", self.id.as_str())
                    .with_context("final_energy", final_energy.to_string()),
            ));
        }
        let beta = probe.beta();
        let gamma = probe.gamma();
        let wavelength = LIGHT_SPEED / self.frequency;
        let kz = TAU * probe.charge * self.voltage() * self.phase().sin()
            / (probe.rest_energy * beta * beta * gamma * gamma * wavelength);
        let damping = beta_gamma(probe.rest_energy, probe.kinetic_energy)
            / beta_gamma(probe.rest_energy, final_energy);

        use PhaseIndex::*;
        let mut m = PhaseMatrix::identity();
        for (pos, div, k) in [(X, XP, -kz / 2.0), (Y, YP, -kz / 2.0), (Z, ZP, kz)] {
            m.set(div, pos, k * damping);
            m.set(div, div, damping);
        }
        check_finite(&self.id, PhaseMap::linear(m))
    }

    fn energy_gain(&self, probe: &ProbeView, _sub_length: f64) -> f64 {
        self.gain(probe)
    }

    fn phase_spread_growth(&self, probe: &ProbeView, sigma_zz: f64) -> [f64; 3] {
        let rest = probe.rest_energy;
        let gain = self.gain(probe);
        let mid_energy = probe.kinetic_energy + gain / 2.0;
        let final_energy = probe.kinetic_energy + gain;
        if !(mid_energy > 0.0) || !(final_energy > 0.0) || !(sigma_zz > 0.0) {
            return [0.0; 3];
        }
        let bg_mid = beta_gamma(rest, mid_energy);
        let bg_final = beta_gamma(rest, final_energy);
        let gamma_mid = 1.0 + mid_energy / rest;
        let wavelength = LIGHT_SPEED / self.frequency;

        // Half-width of the equivalent uniform bunch in RF phase.
        let dphi = TAU / (bg_mid / gamma_mid * wavelength) * (5.0 * sigma_zz).sqrt();
        let kick = probe.charge.abs() * PI * self.voltage().abs()
            / (rest * bg_mid * bg_mid * bg_final * wavelength);
        let sin2 = self.phase().sin().powi(2);
        let cos2 = 1.0 - sin2;
        let f1 = phase_spread_form_factor(dphi);
        let f2 = phase_spread_form_factor(2.0 * dphi);
        let transverse = kick * kick * (0.5 * (1.0 - f2) - sin2 * (f1 * f1 - f2));
        let kz = 2.0 * kick * gamma_mid * gamma_mid;
        let longitudinal =
            kz * kz * dphi * dphi * (0.125 * cos2 + dphi * dphi * sin2 / 576.0);
        [transverse.max(0.0), transverse.max(0.0), longitudinal.max(0.0)]
    }

    fn settings_mut(&mut self) -> Vec<(&'static str, &mut Setting)> {
        vec![("voltage", &mut self.voltage), ("phase", &mut self.phase)]
    }
}
