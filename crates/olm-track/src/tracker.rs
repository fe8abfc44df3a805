use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::ProbeView;
use olm_elem::Element;
use olm_probe::{Kick, Probe, ProbeKind, Trajectory};
use tracing::{debug, trace};

use crate::config::{TrackerConfig, UpdatePolicy};
use crate::coulomb::coulomb_impulses;
use crate::policy::{plan, StepPlan};
use crate::space_charge::space_charge_matrix;

/// Stepping algorithm paired one-to-one with a probe variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Tracker {
    /// Tracks a [`Probe::Particle`].
    Particle(TrackerConfig),
    /// Tracks a [`Probe::Envelope`], with optional linear space charge.
    Envelope(TrackerConfig),
    /// Tracks a [`Probe::Ensemble`], with optional direct Coulomb kicks.
    Ensemble(TrackerConfig),
    /// Tracks a [`Probe::TransferMap`].
    TransferMap(TrackerConfig),
    /// Tracks a [`Probe::Diagnostic`]; one step per element, maps unused.
    Diagnostic(TrackerConfig),
    /// Tracks a [`Probe::Twiss`], with optional linear space charge.
    Twiss(TrackerConfig),
}

impl Tracker {
    /// Tracker matching `kind`, after validating `config`.
    pub fn for_probe(kind: ProbeKind, config: TrackerConfig) -> Result<Self, OlmError> {
        config.validate()?;
        Ok(match kind {
            ProbeKind::Particle => Tracker::Particle(config),
            ProbeKind::Envelope => Tracker::Envelope(config),
            ProbeKind::Ensemble => Tracker::Ensemble(config),
            ProbeKind::TransferMap => Tracker::TransferMap(config),
            ProbeKind::Diagnostic => Tracker::Diagnostic(config),
            ProbeKind::Twiss => Tracker::Twiss(config),
        })
    }

    /// Probe variant this tracker accepts.
    pub fn probe_kind(&self) -> ProbeKind {
        match self {
            Tracker::Particle(_) => ProbeKind::Particle,
            Tracker::Envelope(_) => ProbeKind::Envelope,
            Tracker::Ensemble(_) => ProbeKind::Ensemble,
            Tracker::TransferMap(_) => ProbeKind::TransferMap,
            Tracker::Diagnostic(_) => ProbeKind::Diagnostic,
            Tracker::Twiss(_) => ProbeKind::Twiss,
        }
    }

    /// Tracker options.
    pub fn config(&self) -> &TrackerConfig {
        match self {
            Tracker::Particle(c)
            | Tracker::Envelope(c)
            | Tracker::Ensemble(c)
            | Tracker::TransferMap(c)
            | Tracker::Diagnostic(c)
            | Tracker::Twiss(c) => c,
        }
    }

    /// Mutable tracker options.
    pub fn config_mut(&mut self) -> &mut TrackerConfig {
        match self {
            Tracker::Particle(c)
            | Tracker::Envelope(c)
            | Tracker::Ensemble(c)
            | Tracker::TransferMap(c)
            | Tracker::Diagnostic(c)
            | Tracker::Twiss(c) => c,
        }
    }

    /// Fails with an incompatible-probe error unless `probe` matches this tracker.
    pub fn check_pairing(&self, probe: &Probe) -> Result<(), OlmError> {
        if probe.kind() == self.probe_kind() {
            Ok(())
        } else {
            Err(OlmError::IncompatibleProbe(
                ErrorInfo::new("tracker-pairing", "tracker cannot propagate this probe")
                    .with_context("tracker", self.probe_kind().as_str())
                    .with_context("probe", probe.kind().as_str())
                    .with_hint("build the tracker with Tracker::for_probe(probe.kind(), ..)"),
            ))
        }
    }

    /// Sub-step plan for `element`.
    pub fn plan(&self, element: &dyn Element) -> StepPlan {
        let config = self.config();
        let mut plan = plan(
            element.kind(),
            element.length(),
            config.step_size,
            config.space_charge,
        );
        if let Tracker::Diagnostic(_) = self {
            plan.steps = 1;
            plan.step_length = element.length();
        }
        plan
    }

    /// Propagates `probe` through one element, appending states to `trajectory`.
    ///
    /// Step failures are re-raised as [`OlmError::Model`] carrying the element
    /// id and the original family; states already saved remain in `trajectory`.
    pub fn propagate(
        &self,
        probe: &mut Probe,
        element: &dyn Element,
        trajectory: &mut Trajectory,
    ) -> Result<(), OlmError> {
        self.check_pairing(probe)?;
        self.propagate_inner(probe, element, trajectory)
            .map_err(|err| err.into_model().with_context("element", element.id()))
    }

    fn propagate_inner(
        &self,
        probe: &mut Probe,
        element: &dyn Element,
        trajectory: &mut Trajectory,
    ) -> Result<(), OlmError> {
        let step = self.plan(element);
        let policy = self.config().update_policy;
        debug!(
            element = %element.id(),
            kind = %element.kind(),
            steps = step.steps,
            step_length = step.step_length,
            "propagating element"
        );
        probe.core_mut().element_id = element.id().to_string();
        if policy.saves_entrance() {
            trajectory.push(probe.create_state()?)?;
        }
        for index in 0..step.steps {
            let view = probe.view();
            let l = step.step_length;
            if !matches!(self, Tracker::Diagnostic(_)) {
                let map = element.transfer_map(&view, l)?;
                probe.advance(&map)?;
                self.phase_spread(probe, element, &view)?;
                if let Some(kick) = self.collective_kick(probe, l)? {
                    probe.apply_kick(&kick)?;
                }
            }
            let elapsed = element.elapsed_time(&view, l);
            let gain = element.energy_gain(&view, l);
            probe.core_mut().advance(l, elapsed, gain);
            probe.update();
            trace!(step = index, position = probe.position(), "sub-step done");
            if policy == UpdatePolicy::Always {
                trajectory.push(probe.create_state()?)?;
            }
        }
        if policy.saves_exit() {
            trajectory.push(probe.create_state()?)?;
        }
        Ok(())
    }

    /// RF phase-spread emittance growth at RF gaps, when enabled.
    fn phase_spread(
        &self,
        probe: &mut Probe,
        element: &dyn Element,
        view: &ProbeView,
    ) -> Result<(), OlmError> {
        if !self.config().emittance_growth || !element.kind().is_rf() {
            return Ok(());
        }
        let Some(sigma_zz) = probe.longitudinal_moment() else {
            return Ok(());
        };
        let growth = element.phase_spread_growth(view, sigma_zz);
        trace!(element = %element.id(), ?growth, "phase-spread growth");
        probe.apply_phase_spread(&growth)
    }

    /// Collective kick from the just-advanced state, when the tracker models one.
    pub fn collective_kick(&self, probe: &Probe, length: f64) -> Result<Option<Kick>, OlmError> {
        if !self.config().space_charge || length == 0.0 {
            return Ok(None);
        }
        match (self, probe) {
            (Tracker::Envelope(_), Probe::Envelope(env)) => {
                let perveance = env.perveance();
                if perveance == 0.0 {
                    return Ok(None);
                }
                let gamma = env.core.species.gamma();
                let matrix = space_charge_matrix(&env.covariance, gamma, perveance, length)?;
                Ok(Some(Kick::SpaceCharge(matrix)))
            }
            (Tracker::Twiss(_), Probe::Twiss(tw)) => {
                let perveance = tw.perveance();
                if perveance == 0.0 {
                    return Ok(None);
                }
                let gamma = tw.core.species.gamma();
                let matrix = space_charge_matrix(&tw.covariance()?, gamma, perveance, length)?;
                Ok(Some(Kick::SpaceCharge(matrix)))
            }
            (Tracker::Ensemble(config), Probe::Ensemble(ens)) => {
                let impulses = coulomb_impulses(
                    ens.particles(),
                    &probe.view(),
                    length,
                    config.coulomb_softening,
                );
                Ok(Some(Kick::Impulses(impulses)))
            }
            _ => Ok(None),
        }
    }
}
