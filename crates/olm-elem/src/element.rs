use std::fmt;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{PhaseMap, PhaseMatrix, PhaseVector, ProbeView, LIGHT_SPEED};
use serde::{Deserialize, Serialize};

use crate::sync::{ParameterSource, Setting, SyncMode};

/// Slack allowed when a sub-length slightly exceeds the element length.
pub const LENGTH_TOLERANCE: f64 = 1e-12;

/// Tag identifying the physical kind of an element.
///
/// Trackers derive their step policy from this tag instead of inspecting
/// concrete element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Field-free drift space.
    Drift,
    /// Electromagnetic quadrupole.
    Quadrupole,
    /// Permanent-magnet quadrupole.
    PermanentMagnetQuad,
    /// Sector bending magnet.
    SectorDipole,
    /// Zero-length lens or multipole kick.
    ThinLens,
    /// Zero-length marker.
    Marker,
    /// Thin RF accelerating gap.
    RfGap,
}

impl ElementKind {
    /// Stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Drift => "drift",
            ElementKind::Quadrupole => "quadrupole",
            ElementKind::PermanentMagnetQuad => "permanent-magnet-quad",
            ElementKind::SectorDipole => "sector-dipole",
            ElementKind::ThinLens => "thin-lens",
            ElementKind::Marker => "marker",
            ElementKind::RfGap => "rf-gap",
        }
    }

    /// Elements whose fixed geometry is subdivided uniformly by every tracker.
    pub fn has_fixed_geometry(&self) -> bool {
        matches!(
            self,
            ElementKind::Drift | ElementKind::PermanentMagnetQuad | ElementKind::SectorDipole
        )
    }

    /// Elements whose settings follow the RF source rather than the magnet source.
    pub fn is_rf(&self) -> bool {
        matches!(self, ElementKind::RfGap)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanical misalignment of an element (m).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Alignment {
    /// Horizontal offset.
    #[serde(default)]
    pub dx: f64,
    /// Vertical offset.
    #[serde(default)]
    pub dy: f64,
    /// Longitudinal offset.
    #[serde(default)]
    pub dz: f64,
}

impl Alignment {
    /// Returns true when all offsets vanish.
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.dz == 0.0
    }

    /// Conjugates `matrix` with the offset translation: `T(+d) · M · T(−d)`.
    pub fn apply(&self, matrix: PhaseMatrix) -> Result<PhaseMatrix, OlmError> {
        if self.is_zero() {
            return Ok(matrix);
        }
        let offset = PhaseVector::new(self.dx, 0.0, self.dy, 0.0, self.dz, 0.0);
        PhaseMatrix::translation(&offset)
            .times(&matrix)?
            .times(&PhaseMatrix::translation(&offset.negate()))
    }
}

/// Read-only beamline element.
///
/// Implementations must be deterministic: identical inputs yield identical
/// maps, and building a map never mutates the element or the probe.
pub trait Element: fmt::Debug + Send + Sync {
    /// Unique element identifier.
    fn id(&self) -> &str;

    /// Physical kind used for step-size policies.
    fn kind(&self) -> ElementKind;

    /// Physical length (m); zero for thin elements.
    fn length(&self) -> f64;

    /// Transfer map for exactly `sub_length` metres of the element.
    fn transfer_map(&self, probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError>;

    /// Kinetic energy gained over `sub_length` (eV).
    fn energy_gain(&self, _probe: &ProbeView, _sub_length: f64) -> f64 {
        0.0
    }

    /// Time of flight over `sub_length` (s).
    fn elapsed_time(&self, probe: &ProbeView, sub_length: f64) -> f64 {
        let beta = probe.beta();
        if sub_length == 0.0 || beta <= 0.0 {
            0.0
        } else {
            sub_length / (beta * LIGHT_SPEED)
        }
    }

    /// Phase-spread emittance growth coefficients `(k_x, k_y, k_z)` for a
    /// bunch with longitudinal second moment `sigma_zz` (m²).
    ///
    /// Each coefficient adds `k·<uu>` to `<u'u'>` in its plane. Zero for
    /// everything except RF gaps.
    fn phase_spread_growth(&self, _probe: &ProbeView, _sigma_zz: f64) -> [f64; 3] {
        [0.0; 3]
    }

    /// Synchronizable settings keyed by property name.
    fn settings_mut(&mut self) -> Vec<(&'static str, &mut Setting)> {
        Vec::new()
    }

    /// Resolves every setting from `source` without applying any.
    fn resolve_settings(
        &mut self,
        mode: SyncMode,
        source: &dyn ParameterSource,
    ) -> Result<Vec<f64>, OlmError> {
        let id = self.id().to_string();
        let kind = self.kind();
        self.settings_mut()
            .into_iter()
            .map(|(property, setting)| setting.resolve(&id, property, kind, mode, source))
            .collect()
    }

    /// Applies values produced by [`Element::resolve_settings`], in order.
    fn apply_settings(&mut self, values: &[f64]) {
        for ((_, setting), value) in self.settings_mut().into_iter().zip(values) {
            setting.set_current(*value);
        }
    }

    /// Re-reads every setting from `source` according to `mode`.
    ///
    /// Either all settings of the element are updated or none are.
    fn synchronize(&mut self, mode: SyncMode, source: &dyn ParameterSource) -> Result<(), OlmError> {
        let resolved = self.resolve_settings(mode, source)?;
        self.apply_settings(&resolved);
        Ok(())
    }
}

/// Rejects negative, non-finite or over-long sub-lengths.
pub fn check_sub_length(id: &str, length: f64, sub_length: f64) -> Result<(), OlmError> {
    if !sub_length.is_finite() || sub_length < 0.0 || sub_length > length + LENGTH_TOLERANCE {
        return Err(OlmError::Model(
            ErrorInfo::new(
                "invalid-sub-length",
                "requested sub-length is outside the element",
            )
            .with_context("element", id)
            .with_context("length", length.to_string())
            .with_context("sub_length", sub_length.to_string()),
        ));
    }
    Ok(())
}

/// Rejects maps containing NaN or infinite entries.
pub fn check_finite(id: &str, map: PhaseMap) -> Result<PhaseMap, OlmError> {
    if map.linear_part().is_finite() {
        Ok(map)
    } else {
        Err(OlmError::Model(
            ErrorInfo::new("non-finite-map", "element produced a non-finite transfer map")
                .with_context("element", id),
        ))
    }
}
