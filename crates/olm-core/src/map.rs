//! Transfer maps: a first-order matrix plus optional second-order terms.

use serde::{Deserialize, Serialize};

use crate::errors::OlmError;
use crate::phase::{PhaseMatrix, PhaseVector, PHYS_DIM};

/// Second-order coefficients `T[i][j][k]` over the physical coordinates.
pub type SecondOrderTensor = [[[f64; PHYS_DIM]; PHYS_DIM]; PHYS_DIM];

/// Local transfer map valid over one element sub-length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMap {
    linear: PhaseMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    second_order: Option<Box<SecondOrderTensor>>,
}

impl PhaseMap {
    /// Identity map (zero-length marker).
    pub fn identity() -> Self {
        Self::linear(PhaseMatrix::identity())
    }

    /// Purely linear map.
    pub fn linear(matrix: PhaseMatrix) -> Self {
        Self {
            linear: matrix,
            second_order: None,
        }
    }

    /// Map carrying second-order terms in addition to the linear part.
    pub fn with_second_order(matrix: PhaseMatrix, tensor: SecondOrderTensor) -> Self {
        Self {
            linear: matrix,
            second_order: Some(Box::new(tensor)),
        }
    }

    /// First-order part of the map.
    pub fn linear_part(&self) -> &PhaseMatrix {
        &self.linear
    }

    /// Second-order coefficients, when present.
    pub fn second_order(&self) -> Option<&SecondOrderTensor> {
        self.second_order.as_deref()
    }

    /// Applies the map: `M v + Σ T[i][j][k] v_j v_k`.
    pub fn apply(&self, vector: &PhaseVector) -> PhaseVector {
        let linear = self.linear.apply(vector);
        let Some(tensor) = self.second_order.as_deref() else {
            return linear;
        };
        let v = vector.as_array();
        let mut coords = *linear.as_array();
        for (i, coord) in coords.iter_mut().enumerate() {
            let mut acc = 0.0;
            for j in 0..PHYS_DIM {
                for k in 0..PHYS_DIM {
                    acc += tensor[i][j][k] * v[j] * v[k];
                }
            }
            *coord += acc;
        }
        PhaseVector::from_array(coords)
    }

    /// Composes `self` after `first`, keeping only the linear parts.
    pub fn compose(&self, first: &PhaseMap) -> Result<PhaseMap, OlmError> {
        Ok(PhaseMap::linear(self.linear.times(&first.linear)?))
    }
}
