use std::collections::BTreeMap;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_elem::{Element, ParameterSource, SyncMode};
use tracing::debug;

/// Ordered beamline of materialized elements with unique ids.
///
/// Elements are `Send + Sync`, so a lattice may be shared read-only across
/// concurrent runs.
#[derive(Debug, Default)]
pub struct Lattice {
    id: String,
    elements: Vec<Box<dyn Element>>,
    index: BTreeMap<String, usize>,
}

impl Lattice {
    /// Empty lattice named `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Lattice built from `elements` in order.
    pub fn from_elements(
        id: impl Into<String>,
        elements: Vec<Box<dyn Element>>,
    ) -> Result<Self, OlmError> {
        let mut lattice = Self::new(id);
        for element in elements {
            lattice.push(element)?;
        }
        Ok(lattice)
    }

    /// Appends an element; duplicate ids are rejected.
    pub fn push(&mut self, element: Box<dyn Element>) -> Result<(), OlmError> {
        if self.index.contains_key(element.id()) {
            return Err(OlmError::Config(
                ErrorInfo::new("duplicate-element", "element ids must be unique in a lattice")
                    .with_context("lattice", self.id.as_str())
                    .with_context("element", element.id()),
            ));
        }
        self.index.insert(element.id().to_string(), self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    /// Lattice identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the lattice has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in beamline order.
    pub fn elements(&self) -> &[Box<dyn Element>] {
        &self.elements
    }

    /// Iterates elements in beamline order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Element> {
        self.elements.iter().map(|e| e.as_ref())
    }

    /// Sum of element lengths (m).
    pub fn total_length(&self) -> f64 {
        self.elements.iter().map(|e| e.length()).sum()
    }

    /// Index of the element with `id`.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Element with `id`.
    pub fn element(&self, id: &str) -> Option<&dyn Element> {
        self.index_of(id).map(|i| self.elements[i].as_ref())
    }

    /// Cumulative entrance position of every element, in order.
    pub fn entrance_positions(&self) -> Vec<f64> {
        self.elements
            .iter()
            .scan(0.0, |s, e| {
                let entrance = *s;
                *s += e.length();
                Some(entrance)
            })
            .collect()
    }

    /// Entrance position of the element with `id`.
    pub fn entrance_position(&self, id: &str) -> Option<f64> {
        let idx = self.index_of(id)?;
        Some(self.elements[..idx].iter().map(|e| e.length()).sum())
    }

    /// Index of `id`, failing with a config error when it is unknown.
    pub(crate) fn require(&self, id: &str) -> Result<usize, OlmError> {
        self.index_of(id).ok_or_else(|| {
            OlmError::Config(
                ErrorInfo::new("unknown-element", "element id is not part of the lattice")
                    .with_context("lattice", self.id.as_str())
                    .with_context("element", id),
            )
        })
    }

    /// Re-reads every element setting from `source` according to `mode`.
    ///
    /// All values are resolved before any is applied, so a failure leaves the
    /// whole lattice untouched.
    pub fn resync(&mut self, mode: SyncMode, source: &dyn ParameterSource) -> Result<(), OlmError> {
        let resolved = self
            .elements
            .iter_mut()
            .map(|element| element.resolve_settings(mode, source))
            .collect::<Result<Vec<_>, OlmError>>()?;
        for (element, values) in self.elements.iter_mut().zip(resolved) {
            element.apply_settings(&values);
        }
        debug!(lattice = %self.id, mode = %mode, elements = self.elements.len(), "lattice resynced");
        Ok(())
    }
}
