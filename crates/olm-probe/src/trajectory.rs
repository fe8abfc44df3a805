use std::collections::BTreeMap;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::SchemaVersion;
use serde::{Deserialize, Serialize};

use crate::state::ProbeState;

/// Append-only log of [`ProbeState`]s with non-decreasing positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryRecord", into = "TrajectoryRecord")]
pub struct Trajectory {
    states: Vec<ProbeState>,
    by_element: BTreeMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrajectoryRecord {
    #[serde(default)]
    schema: SchemaVersion,
    states: Vec<ProbeState>,
}

impl TryFrom<TrajectoryRecord> for Trajectory {
    type Error = OlmError;

    fn try_from(record: TrajectoryRecord) -> Result<Self, Self::Error> {
        let mut trajectory = Trajectory::new();
        for state in record.states {
            trajectory.push(state)?;
        }
        Ok(trajectory)
    }
}

impl From<Trajectory> for TrajectoryRecord {
    fn from(trajectory: Trajectory) -> Self {
        Self {
            schema: SchemaVersion::default(),
            states: trajectory.states,
        }
    }
}

impl Trajectory {
    /// Empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a state; a position behind the last recorded one is rejected.
    pub fn push(&mut self, state: ProbeState) -> Result<(), OlmError> {
        if !state.position.is_finite() {
            return Err(OlmError::Model(
                ErrorInfo::new("non-finite-position", "state position must be finite")
                    .with_context("element", state.element_id.as_str()),
            ));
        }
        if let Some(last) = self.states.last() {
            if state.position < last.position {
                return Err(OlmError::Model(
                    ErrorInfo::new("position-decreasing", "trajectory positions must not decrease")
                        .with_context("last", last.position.to_string())
                        .with_context("next", state.position.to_string())
                        .with_context("element", state.element_id.as_str()),
                ));
            }
        }
        self.by_element
            .entry(state.element_id.clone())
            .or_default()
            .push(self.states.len());
        self.states.push(state);
        Ok(())
    }

    /// Number of recorded states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &ProbeState> {
        self.states.iter()
    }

    /// States as a slice.
    pub fn states(&self) -> &[ProbeState] {
        &self.states
    }

    /// States recorded in `element_id`, in position order; empty when unvisited.
    pub fn states_for_element(&self, element_id: &str) -> Vec<&ProbeState> {
        self.by_element
            .get(element_id)
            .map(|indices| indices.iter().map(|&i| &self.states[i]).collect())
            .unwrap_or_default()
    }

    /// First recorded state.
    pub fn initial_state(&self) -> Result<&ProbeState, OlmError> {
        self.states.first().ok_or_else(|| empty("initial_state"))
    }

    /// Last recorded state.
    pub fn final_state(&self) -> Result<&ProbeState, OlmError> {
        self.states.last().ok_or_else(|| empty("final_state"))
    }

    /// State closest to `position`; ties resolve to the earlier state.
    pub fn state_nearest_position(&self, position: f64) -> Result<&ProbeState, OlmError> {
        if self.states.is_empty() {
            return Err(empty("state_nearest_position"));
        }
        let idx = self.states.partition_point(|s| s.position < position);
        // First state at the left neighbour's position, so ties keep the earliest.
        let left = idx.checked_sub(1).map(|i| {
            let s = self.states[i].position;
            self.states.partition_point(|st| st.position < s)
        });
        [left, Some(idx)]
            .into_iter()
            .flatten()
            .filter_map(|i| self.states.get(i))
            .min_by(|a, b| {
                (a.position - position)
                    .abs()
                    .total_cmp(&(b.position - position).abs())
            })
            .ok_or_else(|| empty("state_nearest_position"))
    }

    /// States with `lo <= position <= hi`.
    pub fn states_in_position_range(&self, lo: f64, hi: f64) -> Vec<&ProbeState> {
        let start = self.states.partition_point(|s| s.position < lo);
        self.states[start..]
            .iter()
            .take_while(|s| s.position <= hi)
            .collect()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a ProbeState;
    type IntoIter = std::slice::Iter<'a, ProbeState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

fn empty(query: &str) -> OlmError {
    OlmError::EmptyTrajectory(
        ErrorInfo::new("no-states", "trajectory has no recorded states")
            .with_context("query", query),
    )
}
