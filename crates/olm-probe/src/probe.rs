use std::fmt;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{PhaseIndex, PhaseMap, PhaseMatrix, ProbeView, Species};
use serde::{Deserialize, Serialize};

use crate::diagnostic::DiagnosticProbe;
use crate::ensemble::EnsembleProbe;
use crate::envelope::EnvelopeProbe;
use crate::particle::ParticleProbe;
use crate::state::ProbeState;
use crate::transfer::TransferMapProbe;
use crate::twiss::TwissProbe;

/// Kinematic state shared by every probe variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeCore {
    /// Species and current kinetic energy.
    pub species: Species,
    /// Lattice position `s` (m).
    #[serde(default)]
    pub position: f64,
    /// Elapsed time (s).
    #[serde(default)]
    pub time: f64,
    /// Identifier of the element most recently entered.
    #[serde(default)]
    pub element_id: String,
    #[serde(skip)]
    initial: Option<Box<Probe>>,
}

impl ProbeCore {
    /// Core positioned at the lattice entrance.
    pub fn new(species: Species) -> Self {
        Self {
            species,
            position: 0.0,
            time: 0.0,
            element_id: String::new(),
            initial: None,
        }
    }

    /// Moves the probe by `length` metres, `elapsed` seconds and `energy_gain` eV.
    pub fn advance(&mut self, length: f64, elapsed: f64, energy_gain: f64) {
        self.position += length;
        self.time += elapsed;
        self.species.kinetic_energy += energy_gain;
    }

    /// Read-only kinematic view handed to elements.
    pub fn view(&self) -> ProbeView {
        self.species.view(self.position)
    }
}

/// Discriminant of a [`Probe`], used for tracker pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    /// Single particle.
    Particle,
    /// Second-moment envelope.
    Envelope,
    /// Macro-particle ensemble.
    Ensemble,
    /// Accumulated transfer matrix.
    TransferMap,
    /// Element counter.
    Diagnostic,
    /// Per-plane Twiss parameters.
    Twiss,
}

impl ProbeKind {
    /// Stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Particle => "particle",
            ProbeKind::Envelope => "envelope",
            ProbeKind::Ensemble => "ensemble",
            ProbeKind::TransferMap => "transfer-map",
            ProbeKind::Diagnostic => "diagnostic",
            ProbeKind::Twiss => "twiss",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collective kick computed by a tracker from the just-advanced state.
#[derive(Debug, Clone, PartialEq)]
pub enum Kick {
    /// Linear space-charge matrix applied to an envelope as `σ ← K σ Kᵀ`.
    SpaceCharge(PhaseMatrix),
    /// Per-particle `(Δx', Δy', Δz')` impulses, in ensemble order.
    Impulses(Vec<[f64; 3]>),
}

impl Kick {
    fn label(&self) -> &'static str {
        match self {
            Kick::SpaceCharge(_) => "space-charge",
            Kick::Impulses(_) => "impulses",
        }
    }
}

/// Beam representation propagated through the lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Probe {
    /// Single particle with its accumulated response.
    Particle(ParticleProbe),
    /// Covariance envelope with beam current.
    Envelope(EnvelopeProbe),
    /// Ordered ensemble of macro-particles.
    Ensemble(EnsembleProbe),
    /// Accumulated transfer matrix only.
    TransferMap(TransferMapProbe),
    /// Counts the elements visited.
    Diagnostic(DiagnosticProbe),
    /// Uncoupled Twiss parameters with a centroid.
    Twiss(TwissProbe),
}

impl Probe {
    /// Variant discriminant.
    pub fn kind(&self) -> ProbeKind {
        match self {
            Probe::Particle(_) => ProbeKind::Particle,
            Probe::Envelope(_) => ProbeKind::Envelope,
            Probe::Ensemble(_) => ProbeKind::Ensemble,
            Probe::TransferMap(_) => ProbeKind::TransferMap,
            Probe::Diagnostic(_) => ProbeKind::Diagnostic,
            Probe::Twiss(_) => ProbeKind::Twiss,
        }
    }

    /// Shared kinematic state.
    pub fn core(&self) -> &ProbeCore {
        match self {
            Probe::Particle(p) => &p.core,
            Probe::Envelope(p) => &p.core,
            Probe::Ensemble(p) => &p.core,
            Probe::TransferMap(p) => &p.core,
            Probe::Diagnostic(p) => &p.core,
            Probe::Twiss(p) => &p.core,
        }
    }

    /// Mutable shared kinematic state.
    pub fn core_mut(&mut self) -> &mut ProbeCore {
        match self {
            Probe::Particle(p) => &mut p.core,
            Probe::Envelope(p) => &mut p.core,
            Probe::Ensemble(p) => &mut p.core,
            Probe::TransferMap(p) => &mut p.core,
            Probe::Diagnostic(p) => &mut p.core,
            Probe::Twiss(p) => &mut p.core,
        }
    }

    /// Lattice position (m).
    pub fn position(&self) -> f64 {
        self.core().position
    }

    /// Elapsed time (s).
    pub fn time(&self) -> f64 {
        self.core().time
    }

    /// Kinetic energy (eV).
    pub fn kinetic_energy(&self) -> f64 {
        self.core().species.kinetic_energy
    }

    /// Kinematic view handed to elements.
    pub fn view(&self) -> ProbeView {
        self.core().view()
    }

    /// Applies a local transfer map to the probe state.
    pub fn advance(&mut self, map: &PhaseMap) -> Result<(), OlmError> {
        match self {
            Probe::Particle(p) => p.advance(map),
            Probe::Envelope(p) => p.advance(map),
            Probe::Ensemble(p) => {
                p.advance(map);
                Ok(())
            }
            Probe::TransferMap(p) => p.advance(map),
            Probe::Twiss(p) => p.advance(map),
            Probe::Diagnostic(_) => Ok(()),
        }
    }

    /// Applies RF phase-spread growth `k` per plane to the probes that carry
    /// second moments; other variants ignore it.
    pub fn apply_phase_spread(&mut self, growth: &[f64; 3]) -> Result<(), OlmError> {
        match self {
            Probe::Envelope(p) => p.apply_phase_spread(growth),
            Probe::Twiss(p) => {
                p.apply_phase_spread(growth);
                Ok(())
            }
            Probe::Particle(_)
            | Probe::Ensemble(_)
            | Probe::TransferMap(_)
            | Probe::Diagnostic(_) => Ok(()),
        }
    }

    /// Central `<zz>` moment for probes that carry one.
    pub fn longitudinal_moment(&self) -> Option<f64> {
        match self {
            Probe::Envelope(p) => Some(
                p.covariance.central_moment(PhaseIndex::Z, PhaseIndex::Z),
            ),
            Probe::Twiss(p) => Some(p.longitudinal_moment()),
            _ => None,
        }
    }

    /// Applies a collective kick; only the matching probe variant accepts it.
    pub fn apply_kick(&mut self, kick: &Kick) -> Result<(), OlmError> {
        match (self, kick) {
            (Probe::Envelope(p), Kick::SpaceCharge(matrix)) => p.apply_space_charge(matrix),
            (Probe::Twiss(p), Kick::SpaceCharge(matrix)) => p.apply_space_charge(matrix),
            (Probe::Ensemble(p), Kick::Impulses(impulses)) => p.apply_impulses(impulses),
            (probe, kick) => Err(OlmError::IncompatibleProbe(
                ErrorInfo::new("kick-mismatch", "collective kick does not apply to this probe")
                    .with_context("probe", probe.kind().as_str())
                    .with_context("kick", kick.label()),
            )),
        }
    }

    /// Recomputes derived quantities and records the seeded initial state.
    pub fn initialize(&mut self) -> Result<(), OlmError> {
        match self {
            Probe::Envelope(p) => p.refresh(),
            Probe::Ensemble(p) => p.sort_by_norm(),
            Probe::Particle(_) | Probe::TransferMap(_) | Probe::Diagnostic(_) | Probe::Twiss(_) => {}
        }
        self.core().species.validate()?;
        let mut seed = self.clone();
        seed.core_mut().initial = None;
        self.core_mut().initial = Some(Box::new(seed));
        Ok(())
    }

    /// Restores the state captured by the last [`Probe::initialize`]; no-op otherwise.
    pub fn reset(&mut self) {
        if let Some(initial) = self.core_mut().initial.take() {
            *self = (*initial).clone();
            self.core_mut().initial = Some(initial);
        }
    }

    /// Returns true once [`Probe::initialize`] has captured a seed state.
    pub fn is_initialized(&self) -> bool {
        self.core().initial.is_some()
    }

    /// Per-sub-step bookkeeping after the tracker has moved the probe.
    ///
    /// Ensembles are re-ordered by norm here, after any collective kick.
    pub fn update(&mut self) {
        match self {
            Probe::Envelope(p) => p.refresh(),
            Probe::Ensemble(p) => p.sort_by_norm(),
            Probe::Diagnostic(p) => p.visit(),
            Probe::Particle(_) | Probe::TransferMap(_) | Probe::Twiss(_) => {}
        }
    }

    /// Immutable snapshot of the current state.
    pub fn create_state(&self) -> Result<ProbeState, OlmError> {
        let data = match self {
            Probe::Particle(p) => p.state_data(),
            Probe::Envelope(p) => p.state_data(),
            Probe::Ensemble(p) => p.state_data()?,
            Probe::TransferMap(p) => p.state_data(),
            Probe::Diagnostic(p) => p.state_data(),
            Probe::Twiss(p) => p.state_data(),
        };
        Ok(ProbeState::new(self.core(), data))
    }
}

impl From<ParticleProbe> for Probe {
    fn from(probe: ParticleProbe) -> Self {
        Probe::Particle(probe)
    }
}

impl From<EnvelopeProbe> for Probe {
    fn from(probe: EnvelopeProbe) -> Self {
        Probe::Envelope(probe)
    }
}

impl From<EnsembleProbe> for Probe {
    fn from(probe: EnsembleProbe) -> Self {
        Probe::Ensemble(probe)
    }
}

impl From<TransferMapProbe> for Probe {
    fn from(probe: TransferMapProbe) -> Self {
        Probe::TransferMap(probe)
    }
}

impl From<DiagnosticProbe> for Probe {
    fn from(probe: DiagnosticProbe) -> Self {
        Probe::Diagnostic(probe)
    }
}

impl From<TwissProbe> for Probe {
    fn from(probe: TwissProbe) -> Self {
        Probe::Twiss(probe)
    }
}
