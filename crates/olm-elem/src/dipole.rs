use olm_core::errors::OlmError;
use olm_core::{PhaseIndex, PhaseMap, PhaseMatrix, ProbeView};
use serde::{Deserialize, Serialize};

use crate::drift::check_length;
use crate::element::{check_finite, check_sub_length, Alignment, Element, ElementKind};
use crate::optics;
use crate::sync::Setting;

/// Ideal sector dipole described by its arc length and design bend angle.
///
/// Without a field setting the probe follows the design orbit of curvature
/// `h₀ = angle / length`. With one, the actual curvature `h = q·B/(Bρ)`
/// rescales the dispersive terms by `h₀/h` and adds the orbit offset
/// `(1 − h/h₀)/γ²` through the homogeneous column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDipole {
    id: String,
    length: f64,
    angle: f64,
    #[serde(default)]
    field_index: f64,
    #[serde(default)]
    field: Option<Setting>,
    #[serde(default)]
    alignment: Alignment,
}

impl SectorDipole {
    /// Creates a dipole of arc `length` (m) bending by `angle` (rad).
    pub fn new(id: impl Into<String>, length: f64, angle: f64) -> Result<Self, OlmError> {
        let id = id.into();
        check_length(&id, length)?;
        if !angle.is_finite() || (length == 0.0 && angle != 0.0) {
            return Err(OlmError::model("invalid-bend", "bend angle requires a finite arc")
                .with_context("element", id)
                .with_context("angle", angle.to_string()));
        }
        Ok(Self {
            id,
            length,
            angle,
            field_index: 0.0,
            field: None,
            alignment: Alignment::default(),
        })
    }

    /// Sets the field index `n`; `n > 0` focuses vertically.
    pub fn with_field_index(mut self, field_index: f64) -> Self {
        self.field_index = field_index;
        self
    }

    /// Makes the dipole field (T) a synchronizable setting.
    pub fn with_field(mut self, design_field: f64) -> Self {
        self.field = Some(Setting::new(design_field));
        self
    }

    /// Applies a mechanical misalignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Design curvature `h₀` (m⁻¹).
    pub fn design_curvature(&self) -> f64 {
        if self.length > 0.0 {
            self.angle / self.length
        } else {
            0.0
        }
    }

    fn curvature_ratio(&self, probe: &ProbeView) -> Result<f64, OlmError> {
        let h0 = self.design_curvature();
        let Some(field) = self.field else {
            return Ok(1.0);
        };
        if h0 == 0.0 {
            return Ok(1.0);
        }
        let h = probe.charge_sign() * field.current() / probe.rigidity();
        if h == 0.0 || !h.is_finite() {
            return Err(OlmError::model("zero-curvature", "dipole field does not bend the probe")
                .with_context("element", self.id.as_str())
                .with_context("field", field.current().to_string()));
        }
        Ok(h / h0)
    }
}

impl Element for SectorDipole {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::SectorDipole
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn transfer_map(&self, probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, self.length, sub_length)?;
        let h0 = self.design_curvature();
        let gamma = probe.gamma();
        let g2 = gamma * gamma;
        let kx2 = (1.0 - self.field_index) * h0 * h0;
        let ky2 = self.field_index * h0 * h0;
        let l = sub_length;

        let (c, s, d, f) = optics::principal(kx2, l);
        let mut m = PhaseMatrix::from_blocks(
            [[c, s], [-kx2 * s, c]],
            optics::plane(ky2, l),
            optics::drift(l),
        );

        let ratio = self.curvature_ratio(probe)?;
        let scale = 1.0 / ratio;
        let offset = (1.0 - ratio) / g2;
        let m05 = g2 * h0 * d * scale;
        let m15 = g2 * h0 * s * scale;
        let m45 = (l - g2 * h0 * h0 * f) * scale;

        use PhaseIndex::*;
        m.set(X, ZP, m05);
        m.set(XP, ZP, m15);
        m.set(Z, X, -h0 * s);
        m.set(Z, XP, -h0 * d);
        m.set(Z, ZP, m45);
        m.set(X, HOM, m05 * offset);
        m.set(XP, HOM, m15 * offset);
        m.set(Z, HOM, m45 * offset);

        check_finite(&self.id, PhaseMap::linear(self.alignment.apply(m)?))
    }

    fn settings_mut(&mut self) -> Vec<(&'static str, &mut Setting)> {
        match self.field.as_mut() {
            Some(field) => vec![("field", field)],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olm_core::Species;

    #[test]
    fn full_bend_dispersion_matches_closed_form() {
        let view = Species::proton(1e9).view(0.0);
        let length = 2.0;
        let angle = std::f64::consts::FRAC_PI_8;
        let bend = SectorDipole::new("B1", length, angle).unwrap();
        let m = bend.transfer_map(&view, length).unwrap();
        let rho = length / angle;
        let g2 = view.gamma() * view.gamma();
        let expected = g2 * rho * (1.0 - angle.cos());
        assert!((m.linear_part().get(PhaseIndex::X, PhaseIndex::ZP) - expected).abs() < 1e-9);
        assert!((m.linear_part().get(PhaseIndex::X, PhaseIndex::X) - angle.cos()).abs() < 1e-12);
        assert_eq!(m.linear_part().get(PhaseIndex::X, PhaseIndex::HOM), 0.0);
    }

    #[test]
    fn zero_angle_degenerates_to_drift() {
        let view = Species::proton(1e9).view(0.0);
        let bend = SectorDipole::new("B0", 1.0, 0.0).unwrap();
        let m = bend.transfer_map(&view, 0.5).unwrap();
        assert!((m.linear_part().get(PhaseIndex::X, PhaseIndex::XP) - 0.5).abs() < 1e-12);
        assert!((m.linear_part().get(PhaseIndex::Z, PhaseIndex::ZP) - 0.5).abs() < 1e-12);
    }
}
