use olm_core::errors::OlmError;
use olm_core::{PhaseMap, PhaseMatrix, ProbeView};
use serde::{Deserialize, Serialize};

use crate::drift::check_length;
use crate::element::{check_finite, check_sub_length, Alignment, Element, ElementKind};
use crate::optics;
use crate::sync::Setting;

/// Focusing strength `k² = q·G/(Bρ)` (m⁻²); positive focuses horizontally.
pub fn strength(probe: &ProbeView, gradient: f64) -> f64 {
    probe.charge_sign() * gradient / probe.rigidity()
}

fn quad_map(
    id: &str,
    alignment: &Alignment,
    probe: &ProbeView,
    gradient: f64,
    sub_length: f64,
) -> Result<PhaseMap, OlmError> {
    let k2 = strength(probe, gradient);
    let matrix = PhaseMatrix::from_blocks(
        optics::plane(k2, sub_length),
        optics::plane(-k2, sub_length),
        optics::drift(sub_length),
    );
    check_finite(id, PhaseMap::linear(alignment.apply(matrix)?))
}

/// Quadrupole whose gradient follows the control system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quadrupole {
    id: String,
    length: f64,
    gradient: Setting,
    #[serde(default)]
    alignment: Alignment,
}

impl Quadrupole {
    /// Creates a quadrupole with design gradient (T/m).
    pub fn new(id: impl Into<String>, length: f64, gradient: f64) -> Result<Self, OlmError> {
        let id = id.into();
        check_length(&id, length)?;
        Ok(Self {
            id,
            length,
            gradient: Setting::new(gradient),
            alignment: Alignment::default(),
        })
    }

    /// Applies a mechanical misalignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Gradient currently in effect (T/m).
    pub fn gradient(&self) -> f64 {
        self.gradient.current()
    }
}

impl Element for Quadrupole {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Quadrupole
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn transfer_map(&self, probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, self.length, sub_length)?;
        quad_map(&self.id, &self.alignment, probe, self.gradient(), sub_length)
    }

    fn settings_mut(&mut self) -> Vec<(&'static str, &mut Setting)> {
        vec![("gradient", &mut self.gradient)]
    }
}

/// Permanent-magnet quadrupole; its gradient is fixed and never resynchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentMagnetQuad {
    id: String,
    length: f64,
    gradient: f64,
    #[serde(default)]
    alignment: Alignment,
}

impl PermanentMagnetQuad {
    /// Creates a permanent-magnet quadrupole with gradient (T/m).
    pub fn new(id: impl Into<String>, length: f64, gradient: f64) -> Result<Self, OlmError> {
        let id = id.into();
        check_length(&id, length)?;
        Ok(Self {
            id,
            length,
            gradient,
            alignment: Alignment::default(),
        })
    }

    /// Applies a mechanical misalignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

impl Element for PermanentMagnetQuad {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::PermanentMagnetQuad
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn transfer_map(&self, probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, self.length, sub_length)?;
        quad_map(&self.id, &self.alignment, probe, self.gradient, sub_length)
    }
}
