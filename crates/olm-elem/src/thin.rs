use olm_core::errors::OlmError;
use olm_core::{PhaseIndex, PhaseMap, PhaseMatrix, ProbeView, SecondOrderTensor, PHYS_DIM};
use serde::{Deserialize, Serialize};

use crate::element::{check_sub_length, Element, ElementKind};
use crate::optics;

/// Thin lens with independent plane strengths and an optional sextupole kick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinLens {
    id: String,
    /// Horizontal inverse focal length (m⁻¹); positive focuses.
    #[serde(default)]
    kick_x: f64,
    /// Vertical inverse focal length (m⁻¹); positive focuses.
    #[serde(default)]
    kick_y: f64,
    /// Integrated sextupole strength `K₂L` (m⁻²).
    #[serde(default)]
    sextupole: f64,
}

impl ThinLens {
    /// Lens with inverse focal lengths in each transverse plane.
    pub fn new(id: impl Into<String>, kick_x: f64, kick_y: f64) -> Self {
        Self {
            id: id.into(),
            kick_x,
            kick_y,
            sextupole: 0.0,
        }
    }

    /// Adds a thin sextupole component.
    pub fn with_sextupole(mut self, k2l: f64) -> Self {
        self.sextupole = k2l;
        self
    }

    fn tensor(&self) -> SecondOrderTensor {
        use PhaseIndex::*;
        let half = self.sextupole / 2.0;
        let mut t = [[[0.0; PHYS_DIM]; PHYS_DIM]; PHYS_DIM];
        // Δx' = −K₂L/2 (x² − y²), Δy' = K₂L·x·y
        t[XP.val()][X.val()][X.val()] = -half;
        t[XP.val()][Y.val()][Y.val()] = half;
        t[YP.val()][X.val()][Y.val()] = half;
        t[YP.val()][Y.val()][X.val()] = half;
        t
    }
}

impl Element for ThinLens {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::ThinLens
    }

    fn length(&self) -> f64 {
        0.0
    }

    fn transfer_map(&self, _probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, 0.0, sub_length)?;
        let focal = |kick: f64| if kick == 0.0 { f64::INFINITY } else { 1.0 / kick };
        let matrix = PhaseMatrix::from_blocks(
            optics::thin(focal(self.kick_x)),
            optics::thin(focal(self.kick_y)),
            optics::drift(0.0),
        );
        if self.sextupole == 0.0 {
            Ok(PhaseMap::linear(matrix))
        } else {
            Ok(PhaseMap::with_second_order(matrix, self.tensor()))
        }
    }
}

/// Zero-length reference point; the map is always the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    id: String,
}

impl Marker {
    /// Creates a marker.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Element for Marker {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Marker
    }

    fn length(&self) -> f64 {
        0.0
    }

    fn transfer_map(&self, _probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, 0.0, sub_length)?;
        Ok(PhaseMap::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olm_core::{PhaseVector, Species};

    #[test]
    fn sextupole_kick_is_quadratic() {
        let view = Species::proton(1e8).view(0.0);
        let lens = ThinLens::new("S1", 0.0, 0.0).with_sextupole(4.0);
        let map = lens.transfer_map(&view, 0.0).unwrap();
        let out = map.apply(&PhaseVector::new(0.01, 0.0, 0.02, 0.0, 0.0, 0.0));
        assert!((out.get(PhaseIndex::XP) - (-2.0 * (1e-4 - 4e-4))).abs() < 1e-15);
        assert!((out.get(PhaseIndex::YP) - 4.0 * 0.01 * 0.02).abs() < 1e-15);
    }

    #[test]
    fn marker_rejects_positive_sub_length() {
        let view = Species::proton(1e8).view(0.0);
        assert!(Marker::new("M").transfer_map(&view, 0.1).is_err());
        assert_eq!(Marker::new("M").transfer_map(&view, 0.0).unwrap(), PhaseMap::identity());
    }
}
