use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

/// When a tracker records probe states into the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePolicy {
    /// After every sub-step.
    Always,
    /// Once at each element exit.
    #[default]
    Exit,
    /// Once at each element entrance.
    Entrance,
    /// At both entrance and exit.
    EntranceAndExit,
}

impl UpdatePolicy {
    /// Records a state before the first sub-step.
    pub fn saves_entrance(&self) -> bool {
        matches!(self, UpdatePolicy::Entrance | UpdatePolicy::EntranceAndExit)
    }

    /// Records a state after the last sub-step.
    pub fn saves_exit(&self) -> bool {
        matches!(self, UpdatePolicy::Exit | UpdatePolicy::EntranceAndExit)
    }
}

/// YAML-configurable tracker parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Maximum sub-step length (m) for subdivided elements.
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    /// Enables collective kicks after every sub-step.
    #[serde(default)]
    pub space_charge: bool,
    /// State recording policy.
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    /// First element propagated; the lattice entrance when absent.
    #[serde(default)]
    pub start_element: Option<String>,
    /// Last element considered; the lattice exit when absent.
    #[serde(default)]
    pub stop_element: Option<String>,
    /// Whether the stop element itself is propagated.
    #[serde(default = "default_include_stop")]
    pub include_stop: bool,
    /// Plummer softening length (m) of the ensemble Coulomb kick.
    #[serde(default = "default_coulomb_softening")]
    pub coulomb_softening: f64,
    /// Applies RF phase-spread emittance growth at every RF gap.
    #[serde(default)]
    pub emittance_growth: bool,
}

fn default_step_size() -> f64 {
    0.004
}

fn default_include_stop() -> bool {
    true
}

fn default_coulomb_softening() -> f64 {
    1.0e-5
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            space_charge: false,
            update_policy: UpdatePolicy::default(),
            start_element: None,
            stop_element: None,
            include_stop: default_include_stop(),
            coulomb_softening: default_coulomb_softening(),
            emittance_growth: false,
        }
    }
}

impl TrackerConfig {
    /// Parses a configuration from YAML and validates it.
    pub fn from_yaml_str(text: &str) -> Result<Self, OlmError> {
        let config: TrackerConfig = serde_yaml::from_str(text).map_err(|err| {
            OlmError::Config(ErrorInfo::new("tracker-config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects non-positive step sizes and softening lengths.
    pub fn validate(&self) -> Result<(), OlmError> {
        if !(self.step_size > 0.0) || !self.step_size.is_finite() {
            return Err(OlmError::Config(
                ErrorInfo::new("step-size", "step size must be positive and finite")
                    .with_context("step_size", self.step_size.to_string()),
            ));
        }
        if !(self.coulomb_softening > 0.0) || !self.coulomb_softening.is_finite() {
            return Err(OlmError::Config(
                ErrorInfo::new("coulomb-softening", "softening length must be positive")
                    .with_context("coulomb_softening", self.coulomb_softening.to_string()),
            ));
        }
        Ok(())
    }
}
