//! Particle species and relativistic kinematics.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, OlmError};

/// Speed of light in vacuum (m/s).
pub const LIGHT_SPEED: f64 = 299_792_458.0;

/// Vacuum permittivity (F/m).
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_812_8e-12;

/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Proton rest energy (eV).
pub const PROTON_REST_ENERGY: f64 = 938.272_088_16e6;

/// Negative hydrogen ion rest energy (eV).
pub const HMINUS_REST_ENERGY: f64 = 939.294_308e6;

/// Electron rest energy (eV).
pub const ELECTRON_REST_ENERGY: f64 = 0.510_998_950e6;

/// Species parameters seeded into a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Human readable species label.
    #[serde(default)]
    pub name: String,
    /// Rest energy (eV).
    pub rest_energy: f64,
    /// Charge in units of the elementary charge.
    pub charge: f64,
    /// Kinetic energy (eV).
    pub kinetic_energy: f64,
}

impl Species {
    /// Creates a species after validating its parameters.
    pub fn new(
        name: impl Into<String>,
        rest_energy: f64,
        charge: f64,
        kinetic_energy: f64,
    ) -> Result<Self, OlmError> {
        let species = Self {
            name: name.into(),
            rest_energy,
            charge,
            kinetic_energy,
        };
        species.validate()?;
        Ok(species)
    }

    /// Proton at the given kinetic energy (eV).
    pub fn proton(kinetic_energy: f64) -> Self {
        Self {
            name: "proton".into(),
            rest_energy: PROTON_REST_ENERGY,
            charge: 1.0,
            kinetic_energy,
        }
    }

    /// H⁻ ion at the given kinetic energy (eV).
    pub fn h_minus(kinetic_energy: f64) -> Self {
        Self {
            name: "H-".into(),
            rest_energy: HMINUS_REST_ENERGY,
            charge: -1.0,
            kinetic_energy,
        }
    }

    /// Checks that the rest energy is positive and the kinetic energy is finite and positive.
    pub fn validate(&self) -> Result<(), OlmError> {
        if !(self.rest_energy > 0.0) || !self.rest_energy.is_finite() {
            return Err(OlmError::Config(
                ErrorInfo::new("species-rest-energy", "rest energy must be positive")
                    .with_context("rest_energy", self.rest_energy.to_string()),
            ));
        }
        if !(self.kinetic_energy > 0.0) || !self.kinetic_energy.is_finite() {
            return Err(OlmError::Config(
                ErrorInfo::new("species-kinetic-energy", "kinetic energy must be positive")
                    .with_context("kinetic_energy", self.kinetic_energy.to_string()),
            ));
        }
        if !self.charge.is_finite() {
            return Err(OlmError::Config(ErrorInfo::new(
                "species-charge",
                "charge must be finite",
            )));
        }
        Ok(())
    }

    /// Relativistic factor γ.
    pub fn gamma(&self) -> f64 {
        1.0 + self.kinetic_energy / self.rest_energy
    }

    /// Velocity ratio β = v/c.
    pub fn beta(&self) -> f64 {
        let gamma = self.gamma();
        (1.0 - 1.0 / (gamma * gamma)).sqrt()
    }

    /// Product βγ.
    pub fn beta_gamma(&self) -> f64 {
        self.beta() * self.gamma()
    }

    /// Momentum (eV/c).
    pub fn momentum(&self) -> f64 {
        let w = self.kinetic_energy;
        (w * (w + 2.0 * self.rest_energy)).sqrt()
    }

    /// Magnetic rigidity Bρ (T·m).
    pub fn rigidity(&self) -> f64 {
        self.momentum() / (LIGHT_SPEED * self.charge.abs().max(f64::MIN_POSITIVE))
    }

    /// Read-only kinematic view at the given lattice position.
    pub fn view(&self, position: f64) -> ProbeView {
        ProbeView {
            rest_energy: self.rest_energy,
            charge: self.charge,
            kinetic_energy: self.kinetic_energy,
            position,
        }
    }
}

/// Immutable kinematic snapshot handed to elements when they build a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeView {
    /// Rest energy (eV).
    pub rest_energy: f64,
    /// Charge in units of the elementary charge.
    pub charge: f64,
    /// Kinetic energy (eV).
    pub kinetic_energy: f64,
    /// Lattice position (m).
    pub position: f64,
}

impl ProbeView {
    /// Relativistic factor γ.
    pub fn gamma(&self) -> f64 {
        1.0 + self.kinetic_energy / self.rest_energy
    }

    /// Velocity ratio β.
    pub fn beta(&self) -> f64 {
        let gamma = self.gamma();
        (1.0 - 1.0 / (gamma * gamma)).sqrt()
    }

    /// Magnetic rigidity Bρ (T·m).
    pub fn rigidity(&self) -> f64 {
        let w = self.kinetic_energy;
        let p = (w * (w + 2.0 * self.rest_energy)).sqrt();
        p / (LIGHT_SPEED * self.charge.abs().max(f64::MIN_POSITIVE))
    }

    /// Sign of the charge (+1, −1 or 0).
    pub fn charge_sign(&self) -> f64 {
        if self.charge > 0.0 {
            1.0
        } else if self.charge < 0.0 {
            -1.0
        } else {
            0.0
        }
    }
}
