use olm_core::errors::OlmError;
use olm_core::{PhaseMap, PhaseMatrix, ProbeView};
use serde::{Deserialize, Serialize};

use crate::element::{check_sub_length, Element, ElementKind};
use crate::optics;

/// Field-free region of fixed length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    id: String,
    length: f64,
}

impl Drift {
    /// Creates a drift; the length must be non-negative and finite.
    pub fn new(id: impl Into<String>, length: f64) -> Result<Self, OlmError> {
        let id = id.into();
        check_length(&id, length)?;
        Ok(Self { id, length })
    }
}

impl Element for Drift {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Drift
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn transfer_map(&self, _probe: &ProbeView, sub_length: f64) -> Result<PhaseMap, OlmError> {
        check_sub_length(&self.id, self.length, sub_length)?;
        let block = optics::drift(sub_length);
        Ok(PhaseMap::linear(PhaseMatrix::from_blocks(block, block, block)))
    }
}

/// Rejects negative or non-finite element lengths.
pub(crate) fn check_length(id: &str, length: f64) -> Result<(), OlmError> {
    if length.is_finite() && length >= 0.0 {
        Ok(())
    } else {
        Err(OlmError::model("invalid-length", "element length must be non-negative")
            .with_context("element", id)
            .with_context("length", length.to_string()))
    }
}
