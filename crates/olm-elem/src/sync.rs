use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

use crate::element::ElementKind;

/// Where element settings are read from on resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Restore the stored design values.
    #[default]
    Design,
    /// Read every setting from the live source.
    Live,
    /// Magnets from the live source, RF settings from design.
    RfDesign,
}

impl SyncMode {
    /// Stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Design => "design",
            SyncMode::Live => "live",
            SyncMode::RfDesign => "rf-design",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of live parameter values keyed by element id and property name.
pub trait ParameterSource: Send + Sync {
    /// Current value of `property` on `element_id`, if the source knows it.
    fn value(&self, element_id: &str, property: &str) -> Option<f64>;
}

/// Source that never returns a value; adequate for design-only resyncs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesignOnly;

impl ParameterSource for DesignOnly {
    fn value(&self, _element_id: &str, _property: &str) -> Option<f64> {
        None
    }
}

/// In-memory snapshot of machine settings, loadable from YAML.
///
/// ```yaml
/// values:
///   QH01:
///     gradient: 4.2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    /// Values per element id, then per property.
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ParameterSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one value.
    pub fn insert(&mut self, element_id: impl Into<String>, property: impl Into<String>, value: f64) {
        self.values
            .entry(element_id.into())
            .or_default()
            .insert(property.into(), value);
    }

    /// Parses a snapshot from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, OlmError> {
        serde_yaml::from_str(text).map_err(|err| {
            OlmError::Config(ErrorInfo::new("snapshot-parse", err.to_string()))
        })
    }

    /// Loads a snapshot from a YAML file.
    pub fn load(path: &Path) -> Result<Self, OlmError> {
        let text = fs::read_to_string(path).map_err(|err| {
            OlmError::Config(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }
}

impl ParameterSource for ParameterSnapshot {
    fn value(&self, element_id: &str, property: &str) -> Option<f64> {
        self.values
            .get(element_id)
            .and_then(|props| props.get(property))
            .copied()
    }
}

/// Element setting with a design value and the value currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    design: f64,
    current: f64,
}

impl Setting {
    /// Setting whose current value equals the design value.
    pub fn new(design: f64) -> Self {
        Self {
            design,
            current: design,
        }
    }

    /// Design value.
    pub fn design(&self) -> f64 {
        self.design
    }

    /// Value used when building maps.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Overrides the value in effect.
    pub fn set_current(&mut self, value: f64) {
        self.current = value;
    }

    /// Value this setting takes under `mode` without applying it.
    pub fn resolve(
        &self,
        element_id: &str,
        property: &str,
        kind: ElementKind,
        mode: SyncMode,
        source: &dyn ParameterSource,
    ) -> Result<f64, OlmError> {
        let live = match mode {
            SyncMode::Design => false,
            SyncMode::Live => true,
            SyncMode::RfDesign => !kind.is_rf(),
        };
        if !live {
            return Ok(self.design);
        }
        match source.value(element_id, property) {
            Some(value) if value.is_finite() => Ok(value),
            Some(value) => Err(OlmError::Synchronization(
                ErrorInfo::new("non-finite-value", "live source returned a non-finite value")
                    .with_context("element", element_id)
                    .with_context("property", property)
                    .with_context("value", value.to_string()),
            )),
            None => Err(OlmError::Synchronization(
                ErrorInfo::new("missing-value", "live source has no value for the property")
                    .with_context("element", element_id)
                    .with_context("property", property)
                    .with_context("mode", mode.as_str())
                    .with_hint("add the property to the parameter snapshot or resync in design mode"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rf_design_keeps_rf_settings_at_design() {
        let mut snapshot = ParameterSnapshot::new();
        snapshot.insert("GAP1", "voltage", 2.0e6);
        let setting = Setting::new(1.0e6);
        let value = setting
            .resolve("GAP1", "voltage", ElementKind::RfGap, SyncMode::RfDesign, &snapshot)
            .unwrap();
        assert_eq!(value, 1.0e6);
        let value = setting
            .resolve("GAP1", "voltage", ElementKind::RfGap, SyncMode::Live, &snapshot)
            .unwrap();
        assert_eq!(value, 2.0e6);
    }

    #[test]
    fn missing_live_value_is_a_sync_error() {
        let setting = Setting::new(3.0);
        let err = setting
            .resolve("Q1", "gradient", ElementKind::Quadrupole, SyncMode::Live, &DesignOnly)
            .unwrap_err();
        assert!(matches!(err, OlmError::Synchronization(_)));
        assert_eq!(err.info().code, "missing-value");
    }

    #[test]
    fn overriding_current_keeps_design() {
        let mut setting = Setting::new(3.0);
        setting.set_current(4.5);
        assert_eq!(setting.current(), 4.5);
        assert_eq!(setting.design(), 3.0);
        let value = setting
            .resolve("Q1", "gradient", ElementKind::Quadrupole, SyncMode::Design, &DesignOnly)
            .unwrap();
        assert_eq!(value, 3.0);
    }

    #[test]
    fn snapshot_parses_yaml() {
        let snapshot =
            ParameterSnapshot::from_yaml_str("values:\n  Q1:\n    gradient: 4.5\n").unwrap();
        assert_eq!(snapshot.value("Q1", "gradient"), Some(4.5));
        assert_eq!(snapshot.value("Q1", "length"), None);
    }
}
