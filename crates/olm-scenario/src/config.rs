use std::fs;
use std::path::Path;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{CovarianceMatrix, PhaseVector, Species, Twiss};
use olm_elem::{
    Alignment, Drift, Element, Marker, PermanentMagnetQuad, Quadrupole, RfGap, SectorDipole,
    SyncMode, ThinLens,
};
use olm_probe::hash::hash_json;
use olm_probe::{
    DiagnosticProbe, EnsembleProbe, EnvelopeProbe, ParticleProbe, Probe, ProbeKind,
    TransferMapProbe, TwissProbe,
};
use olm_track::{Tracker, TrackerConfig};
use serde::{Deserialize, Serialize};

use crate::lattice::Lattice;
use crate::scenario::Scenario;

/// YAML run description: lattice, probe seed, tracker options and sync mode.
///
/// ```yaml
/// lattice:
///   id: mebt
///   elements:
///     - { kind: drift, id: D1, length: 0.5 }
///     - { kind: quadrupole, id: Q1, length: 0.1, gradient: 12.0 }
/// probe:
///   kind: envelope
///   species: { name: proton, kinetic_energy: 2.5e6 }
///   twiss:
///     - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
///     - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
///     - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
///   current: 0.03
/// tracker:
///   space_charge: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Beamline description.
    pub lattice: LatticeSpec,
    /// Initial probe.
    pub probe: ProbeSpec,
    /// Tracker options.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Sync mode used by resyncs.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Seed for ensemble population.
    #[serde(default)]
    pub seed: u64,
}

impl ScenarioConfig {
    /// Parses a run description from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, OlmError> {
        serde_yaml::from_str(text)
            .map_err(|err| OlmError::Config(ErrorInfo::new("scenario-parse", err.to_string())))
    }

    /// Loads a run description from a YAML file.
    pub fn load(path: &Path) -> Result<Self, OlmError> {
        let text = fs::read_to_string(path).map_err(|err| {
            OlmError::Config(
                ErrorInfo::new("scenario-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Materializes the lattice, probe and tracker into a ready scenario.
    pub fn build(&self) -> Result<Scenario, OlmError> {
        let lattice = self.lattice.build()?;
        let probe = self.probe.build(self.seed)?;
        let tracker = Tracker::for_probe(probe.kind(), self.tracker.clone())?;
        let mut scenario = Scenario::new(lattice, tracker, probe)?
            .with_provenance(hash_json(&self.lattice)?, self.seed);
        scenario.set_sync_mode(self.sync_mode);
        if let Some(id) = &self.tracker.start_element {
            scenario.set_start_element(Some(id.as_str()))?;
        }
        if let Some(id) = &self.tracker.stop_element {
            scenario.set_stop_element(Some(id.as_str()))?;
        }
        Ok(scenario)
    }
}

/// Ordered element list with a lattice id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeSpec {
    /// Lattice identifier.
    pub id: String,
    /// Elements in beamline order.
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

impl LatticeSpec {
    /// Builds every element, rejecting duplicate ids.
    pub fn build(&self) -> Result<Lattice, OlmError> {
        let mut lattice = Lattice::new(self.id.as_str());
        for spec in &self.elements {
            lattice.push(spec.build()?)?;
        }
        Ok(lattice)
    }
}

/// One element of a [`LatticeSpec`], tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ElementSpec {
    /// Field-free drift.
    Drift {
        /// Element id.
        id: String,
        /// Length (m).
        length: f64,
    },
    /// Electromagnetic quadrupole.
    Quadrupole {
        /// Element id.
        id: String,
        /// Length (m).
        length: f64,
        /// Design gradient (T/m).
        gradient: f64,
        /// Mechanical offsets.
        #[serde(default)]
        alignment: Alignment,
    },
    /// Permanent-magnet quadrupole.
    PermanentMagnetQuad {
        /// Element id.
        id: String,
        /// Length (m).
        length: f64,
        /// Fixed gradient (T/m).
        gradient: f64,
        /// Mechanical offsets.
        #[serde(default)]
        alignment: Alignment,
    },
    /// Sector bending magnet.
    SectorDipole {
        /// Element id.
        id: String,
        /// Arc length (m).
        length: f64,
        /// Bend angle (rad).
        angle: f64,
        /// Field index `n`.
        #[serde(default)]
        field_index: f64,
        /// Design field (T); the design curvature is used when absent.
        #[serde(default)]
        field: Option<f64>,
        /// Mechanical offsets.
        #[serde(default)]
        alignment: Alignment,
    },
    /// Thin focusing lens.
    ThinLens {
        /// Element id.
        id: String,
        /// Horizontal integrated strength (1/m).
        #[serde(default)]
        kick_x: f64,
        /// Vertical integrated strength (1/m).
        #[serde(default)]
        kick_y: f64,
        /// Integrated sextupole strength (1/m²).
        #[serde(default)]
        sextupole: f64,
    },
    /// Zero-length marker.
    Marker {
        /// Element id.
        id: String,
    },
    /// Thin RF gap.
    RfGap {
        /// Element id.
        id: String,
        /// Effective voltage (V).
        voltage: f64,
        /// Synchronous phase (rad).
        phase: f64,
        /// RF frequency (Hz).
        frequency: f64,
    },
}

impl ElementSpec {
    /// Element id.
    pub fn id(&self) -> &str {
        match self {
            ElementSpec::Drift { id, .. }
            | ElementSpec::Quadrupole { id, .. }
            | ElementSpec::PermanentMagnetQuad { id, .. }
            | ElementSpec::SectorDipole { id, .. }
            | ElementSpec::ThinLens { id, .. }
            | ElementSpec::Marker { id }
            | ElementSpec::RfGap { id, .. } => id,
        }
    }

    /// Materializes the element.
    pub fn build(&self) -> Result<Box<dyn Element>, OlmError> {
        let element: Box<dyn Element> = match self {
            ElementSpec::Drift { id, length } => Box::new(Drift::new(id.as_str(), *length)?),
            ElementSpec::Quadrupole {
                id,
                length,
                gradient,
                alignment,
            } => Box::new(
                Quadrupole::new(id.as_str(), *length, *gradient)?.with_alignment(*alignment),
            ),
            ElementSpec::PermanentMagnetQuad {
                id,
                length,
                gradient,
                alignment,
            } => Box::new(
                PermanentMagnetQuad::new(id.as_str(), *length, *gradient)?
                    .with_alignment(*alignment),
            ),
            ElementSpec::SectorDipole {
                id,
                length,
                angle,
                field_index,
                field,
                alignment,
            } => {
                let mut dipole = SectorDipole::new(id.as_str(), *length, *angle)?
                    .with_field_index(*field_index)
                    .with_alignment(*alignment);
                if let Some(field) = field {
                    dipole = dipole.with_field(*field);
                }
                Box::new(dipole)
            }
            ElementSpec::ThinLens {
                id,
                kick_x,
                kick_y,
                sextupole,
            } => Box::new(ThinLens::new(id.as_str(), *kick_x, *kick_y).with_sextupole(*sextupole)),
            ElementSpec::Marker { id } => Box::new(Marker::new(id.as_str())),
            ElementSpec::RfGap {
                id,
                voltage,
                phase,
                frequency,
            } => Box::new(RfGap::new(id.as_str(), *voltage, *phase, *frequency)?),
        };
        Ok(element)
    }
}

/// Species by preset name, or fully specified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSpec {
    /// `proton`, `h-minus`, or any label when `rest_energy` and `charge` are given.
    #[serde(default = "default_species")]
    pub name: String,
    /// Kinetic energy (eV).
    pub kinetic_energy: f64,
    /// Rest energy (eV) for custom species.
    #[serde(default)]
    pub rest_energy: Option<f64>,
    /// Charge in units of e for custom species.
    #[serde(default)]
    pub charge: Option<f64>,
}

fn default_species() -> String {
    "proton".into()
}

impl SpeciesSpec {
    /// Resolves the species.
    pub fn build(&self) -> Result<Species, OlmError> {
        match (self.rest_energy, self.charge) {
            (Some(rest_energy), Some(charge)) => {
                Species::new(self.name.as_str(), rest_energy, charge, self.kinetic_energy)
            }
            (None, None) => {
                let species = match self.name.as_str() {
                    "proton" => Species::proton(self.kinetic_energy),
                    "h-minus" => Species::h_minus(self.kinetic_energy),
                    other => {
                        return Err(OlmError::Config(
                            ErrorInfo::new("unknown-species", "species preset is not known")
                                .with_context("name", other)
                                .with_hint("give rest_energy and charge for custom species"),
                        ))
                    }
                };
                species.validate()?;
                Ok(species)
            }
            _ => Err(OlmError::Config(
                ErrorInfo::new("species-incomplete", "rest_energy and charge go together")
                    .with_context("name", self.name.as_str()),
            )),
        }
    }
}

/// Initial probe description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Probe variant.
    pub kind: ProbeKind,
    /// Species and energy.
    pub species: SpeciesSpec,
    /// Centroid `(x, x', y, y', z, z')`.
    #[serde(default)]
    pub centroid: [f64; 6],
    /// Twiss triple (x, y, z); required for envelope, ensemble and Twiss probes.
    #[serde(default)]
    pub twiss: Option<[Twiss; 3]>,
    /// Beam current (A).
    #[serde(default)]
    pub current: f64,
    /// Bunch frequency (Hz).
    #[serde(default = "default_bunch_frequency")]
    pub bunch_frequency: f64,
    /// Number of macro-particles for ensembles.
    #[serde(default = "default_particles")]
    pub particles: usize,
}

fn default_bunch_frequency() -> f64 {
    402.5e6
}

fn default_particles() -> usize {
    1000
}

impl ProbeSpec {
    /// Builds the probe; ensembles are drawn with `seed`.
    pub fn build(&self, seed: u64) -> Result<Probe, OlmError> {
        let species = self.species.build()?;
        let centroid = PhaseVector::from_array(self.centroid);
        Ok(match self.kind {
            ProbeKind::Particle => ParticleProbe::new(species, centroid).into(),
            ProbeKind::TransferMap => TransferMapProbe::new(species).into(),
            ProbeKind::Diagnostic => DiagnosticProbe::new(species).into(),
            ProbeKind::Envelope => EnvelopeProbe::new(species, self.covariance(&centroid)?)
                .with_current(self.current, self.bunch_frequency)?
                .into(),
            ProbeKind::Twiss => TwissProbe::new(species, self.twiss_planes()?)?
                .with_centroid(centroid)
                .with_current(self.current, self.bunch_frequency)?
                .into(),
            ProbeKind::Ensemble => {
                if !(self.bunch_frequency > 0.0) {
                    return Err(OlmError::Config(
                        ErrorInfo::new("bunch-frequency", "bunch frequency must be positive")
                            .with_context("bunch_frequency", self.bunch_frequency.to_string()),
                    ));
                }
                // Macro-particle charges carry the species sign.
                let bunch_charge = species.charge.signum() * self.current / self.bunch_frequency;
                EnsembleProbe::gaussian(
                    species,
                    &self.covariance(&centroid)?,
                    self.particles,
                    bunch_charge,
                    seed,
                )?
                .into()
            }
        })
    }

    fn twiss_planes(&self) -> Result<[Twiss; 3], OlmError> {
        self.twiss.ok_or_else(|| {
            OlmError::Config(
                ErrorInfo::new("missing-twiss", "this probe kind needs twiss parameters")
                    .with_context("kind", self.kind.as_str()),
            )
        })
    }

    fn covariance(&self, centroid: &PhaseVector) -> Result<CovarianceMatrix, OlmError> {
        let [tx, ty, tz] = self.twiss_planes()?;
        for t in [&tx, &ty, &tz] {
            t.validate()?;
        }
        CovarianceMatrix::from_twiss_with_centroid(&tx, &ty, &tz, centroid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"
lattice:
  id: cell
  elements:
    - { kind: drift, id: D1, length: 0.5 }
    - { kind: quadrupole, id: Q1, length: 0.1, gradient: 12.0, alignment: { dx: 1.0e-4 } }
    - { kind: sector-dipole, id: B1, length: 0.5, angle: 0.1 }
    - { kind: thin-lens, id: L1, kick_x: 0.2 }
    - { kind: marker, id: M1 }
    - { kind: rf-gap, id: G1, voltage: 1.0e5, phase: -0.5, frequency: 402.5e6 }
probe:
  kind: particle
  species: { kinetic_energy: 2.5e6 }
  centroid: [1.0e-3, 0.0, 0.0, 0.0, 0.0, 0.0]
tracker:
  step_size: 0.05
sync_mode: live
"#;

    #[test]
    fn yaml_builds_every_element_kind() {
        let config = ScenarioConfig::from_yaml_str(RUN).unwrap();
        assert_eq!(config.lattice.elements.len(), 6);
        assert_eq!(config.lattice.elements[2].id(), "B1");
        assert_eq!(config.sync_mode, SyncMode::Live);
        let scenario = config.build().unwrap();
        assert_eq!(scenario.lattice().len(), 6);
        assert!((scenario.lattice().total_length() - 1.1).abs() < 1e-12);
        assert_eq!(scenario.probe().kind(), ProbeKind::Particle);
        assert_eq!(scenario.sync_mode(), SyncMode::Live);
        assert_eq!(scenario.provenance().lattice_id, "cell");
        assert_eq!(scenario.provenance().lattice_hash.len(), 64);
    }

    #[test]
    fn envelope_requires_twiss() {
        let spec = ProbeSpec {
            kind: ProbeKind::Envelope,
            species: SpeciesSpec {
                name: default_species(),
                kinetic_energy: 2.5e6,
                rest_energy: None,
                charge: None,
            },
            centroid: [0.0; 6],
            twiss: None,
            current: 0.0,
            bunch_frequency: default_bunch_frequency(),
            particles: default_particles(),
        };
        let err = spec.build(0).unwrap_err();
        assert_eq!(err.info().code, "missing-twiss");
        let twiss = ProbeSpec {
            kind: ProbeKind::Twiss,
            ..spec
        };
        assert_eq!(twiss.build(0).unwrap_err().info().code, "missing-twiss");
    }

    #[test]
    fn yaml_builds_twiss_probe_with_growth() {
        let text = r#"
lattice:
  id: gap
  elements:
    - { kind: drift, id: D1, length: 0.2 }
    - { kind: rf-gap, id: G1, voltage: 2.0e5, phase: -0.5, frequency: 402.5e6 }
    - { kind: drift, id: D2, length: 0.2 }
probe:
  kind: twiss
  species: { kinetic_energy: 2.5e6 }
  twiss:
    - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
    - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
    - { alpha: 0.0, beta: 1.0, emittance: 1.0e-6 }
tracker:
  step_size: 0.05
  emittance_growth: true
"#;
        let exit_emittance = |text: &str| {
            let mut scenario = ScenarioConfig::from_yaml_str(text).unwrap().build().unwrap();
            assert_eq!(scenario.probe().kind(), ProbeKind::Twiss);
            scenario.run().unwrap();
            let Probe::Twiss(probe) = scenario.probe() else {
                panic!("expected a Twiss probe");
            };
            probe.twiss[0].emittance
        };
        let grown = exit_emittance(text);
        let plain = text.replace("emittance_growth: true", "emittance_growth: false");
        let damped = exit_emittance(&plain);
        assert!(grown > damped);
    }

    #[test]
    fn unknown_species_is_rejected() {
        let spec = SpeciesSpec {
            name: "muon".into(),
            kinetic_energy: 1.0e6,
            rest_energy: None,
            charge: None,
        };
        assert_eq!(spec.build().unwrap_err().info().code, "unknown-species");
        let custom = SpeciesSpec {
            rest_energy: Some(105.658e6),
            charge: Some(-1.0),
            ..spec
        };
        assert_eq!(custom.build().unwrap().name, "muon");
    }
}
