use std::collections::BTreeMap;

use olm_core::errors::OlmError;
use olm_core::RunProvenance;
use olm_elem::{ParameterSource, SyncMode};
use olm_probe::{Probe, ProbeState, Trajectory};
use olm_track::Tracker;

use crate::checkpoint::TrajectoryCheckpoint;
use crate::driver::{propagate, RunFailure};
use crate::lattice::Lattice;

/// Owns a lattice, a tracker and a probe for the duration of runs.
#[derive(Debug)]
pub struct Scenario {
    lattice: Lattice,
    tracker: Tracker,
    probe: Probe,
    sync_mode: SyncMode,
    trajectory: Trajectory,
    lattice_hash: String,
    seed: u64,
}

impl Scenario {
    /// Pairs `tracker` with `probe` and seeds the probe's initial state.
    pub fn new(lattice: Lattice, tracker: Tracker, mut probe: Probe) -> Result<Self, OlmError> {
        tracker.check_pairing(&probe)?;
        tracker.config().validate()?;
        probe.initialize()?;
        Ok(Self {
            lattice,
            tracker,
            probe,
            sync_mode: SyncMode::default(),
            trajectory: Trajectory::new(),
            lattice_hash: String::new(),
            seed: 0,
        })
    }

    /// Records the lattice description hash and ensemble seed for provenance.
    pub fn with_provenance(mut self, lattice_hash: impl Into<String>, seed: u64) -> Self {
        self.lattice_hash = lattice_hash.into();
        self.seed = seed;
        self
    }

    /// Propagates the probe from its current state through the lattice window.
    ///
    /// The trajectory is returned to the caller and also kept for queries.
    pub fn run(&mut self) -> Result<Trajectory, RunFailure> {
        match propagate(&self.lattice, &self.tracker, &mut self.probe) {
            Ok(trajectory) => {
                self.trajectory = trajectory.clone();
                Ok(trajectory)
            }
            Err(failure) => {
                self.trajectory = failure.partial.clone();
                Err(failure)
            }
        }
    }

    /// Re-reads element settings from `source` under the current sync mode.
    pub fn resync(&mut self, source: &dyn ParameterSource) -> Result<(), OlmError> {
        self.lattice.resync(self.sync_mode, source)
    }

    /// Restores the probe to its seeded initial state and clears the trajectory.
    pub fn reset_probe(&mut self) {
        self.probe.reset();
        self.trajectory = Trajectory::new();
    }

    /// Selects the sync mode used by [`Scenario::resync`].
    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        self.sync_mode = mode;
    }

    /// Sync mode in effect.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// First element propagated; `None` starts at the lattice entrance.
    pub fn set_start_element(&mut self, id: Option<&str>) -> Result<(), OlmError> {
        if let Some(id) = id {
            self.lattice.require(id)?;
        }
        self.tracker.config_mut().start_element = id.map(str::to_string);
        Ok(())
    }

    /// Last element considered; `None` runs to the lattice exit.
    pub fn set_stop_element(&mut self, id: Option<&str>) -> Result<(), OlmError> {
        if let Some(id) = id {
            self.lattice.require(id)?;
        }
        self.tracker.config_mut().stop_element = id.map(str::to_string);
        Ok(())
    }

    /// Whether the stop element itself is propagated.
    pub fn set_include_stop_element(&mut self, include: bool) {
        self.tracker.config_mut().include_stop = include;
    }

    /// States recorded in `element_id` during the last run.
    pub fn trajectory_states_for_element(&self, element_id: &str) -> Vec<&ProbeState> {
        self.trajectory.states_for_element(element_id)
    }

    /// Trajectory of the last run.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Probe in its current state.
    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Lattice being propagated.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Tracker in use.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Provenance record describing this scenario.
    pub fn provenance(&self) -> RunProvenance {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        RunProvenance {
            lattice_id: self.lattice.id().to_string(),
            lattice_hash: self.lattice_hash.clone(),
            probe_kind: self.probe.kind().as_str().to_string(),
            sync_mode: self.sync_mode.as_str().to_string(),
            seed: self.seed,
            tool_versions,
        }
    }

    /// Checkpoint of the last run's trajectory.
    pub fn checkpoint(&self) -> Result<TrajectoryCheckpoint, OlmError> {
        TrajectoryCheckpoint::new(self.provenance(), self.trajectory.clone())
    }
}
