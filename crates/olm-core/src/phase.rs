//! Homogeneous phase-space vectors and matrices.
//!
//! Coordinates are ordered `(x, x', y, y', z, z', 1)`. The trailing
//! homogeneous coordinate lets affine maps on the six physical coordinates be
//! expressed as linear maps on seven.

use std::fmt;

use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, OlmError};

/// Dimension of the homogeneous phase space.
pub const PHASE_DIM: usize = 7;

/// Number of physical phase-space coordinates.
pub const PHYS_DIM: usize = 6;

/// Determinant magnitude below which the 6×6 block is treated as singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Named index into homogeneous phase space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseIndex {
    /// Horizontal position.
    X,
    /// Horizontal divergence.
    XP,
    /// Vertical position.
    Y,
    /// Vertical divergence.
    YP,
    /// Longitudinal position.
    Z,
    /// Longitudinal divergence.
    ZP,
    /// Homogeneous coordinate.
    HOM,
}

impl PhaseIndex {
    /// All indices in storage order.
    pub const ALL: [PhaseIndex; PHASE_DIM] = [
        PhaseIndex::X,
        PhaseIndex::XP,
        PhaseIndex::Y,
        PhaseIndex::YP,
        PhaseIndex::Z,
        PhaseIndex::ZP,
        PhaseIndex::HOM,
    ];

    /// Physical (non-homogeneous) indices in storage order.
    pub const PHYSICAL: [PhaseIndex; PHYS_DIM] = [
        PhaseIndex::X,
        PhaseIndex::XP,
        PhaseIndex::Y,
        PhaseIndex::YP,
        PhaseIndex::Z,
        PhaseIndex::ZP,
    ];

    /// Returns the storage offset of the index.
    pub const fn val(self) -> usize {
        self as usize
    }
}

/// Seven-component homogeneous phase vector.
///
/// Only the six physical coordinates are stored; the homogeneous coordinate
/// is always exactly `1.0` and cannot be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseVector {
    coords: [f64; PHYS_DIM],
}

impl PhaseVector {
    /// The origin of phase space.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Creates a phase vector from its physical coordinates.
    pub fn new(x: f64, xp: f64, y: f64, yp: f64, z: f64, zp: f64) -> Self {
        Self {
            coords: [x, xp, y, yp, z, zp],
        }
    }

    /// Creates a phase vector from an array of physical coordinates.
    pub fn from_array(coords: [f64; PHYS_DIM]) -> Self {
        Self { coords }
    }

    /// Returns the physical coordinates.
    pub fn as_array(&self) -> &[f64; PHYS_DIM] {
        &self.coords
    }

    /// Returns the full homogeneous representation.
    pub fn homogeneous(&self) -> [f64; PHASE_DIM] {
        let mut out = [1.0; PHASE_DIM];
        out[..PHYS_DIM].copy_from_slice(&self.coords);
        out
    }

    /// Returns the coordinate at the given index.
    pub fn get(&self, index: PhaseIndex) -> f64 {
        match index {
            PhaseIndex::HOM => 1.0,
            other => self.coords[other.val()],
        }
    }

    /// Sets a physical coordinate. Writing the homogeneous coordinate fails.
    pub fn set(&mut self, index: PhaseIndex, value: f64) -> Result<(), OlmError> {
        match index {
            PhaseIndex::HOM => Err(OlmError::Model(
                ErrorInfo::new(
                    "hom-coordinate",
                    "the homogeneous coordinate of a phase vector is fixed at 1",
                )
                .with_context("value", value.to_string()),
            )),
            other => {
                self.coords[other.val()] = value;
                Ok(())
            }
        }
    }

    /// Component-wise sum of the physical coordinates.
    pub fn plus(&self, other: &PhaseVector) -> PhaseVector {
        let mut coords = self.coords;
        for (lhs, rhs) in coords.iter_mut().zip(other.coords.iter()) {
            *lhs += rhs;
        }
        Self { coords }
    }

    /// Scales the physical coordinates.
    pub fn times(&self, factor: f64) -> PhaseVector {
        Self {
            coords: self.coords.map(|c| c * factor),
        }
    }

    /// Negates the physical coordinates.
    pub fn negate(&self) -> PhaseVector {
        self.times(-1.0)
    }

    /// Euclidean norm of the physical coordinates.
    pub fn norm2(&self) -> f64 {
        self.coords.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    /// Outer product `self · otherᵀ` in homogeneous space.
    pub fn outer_product(&self, other: &PhaseVector) -> PhaseMatrix {
        let lhs = self.homogeneous();
        let rhs = other.homogeneous();
        let mut elems = [[0.0; PHASE_DIM]; PHASE_DIM];
        for (i, row) in elems.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = lhs[i] * rhs[j];
            }
        }
        PhaseMatrix { elems }
    }

    /// Returns true when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }
}

impl fmt::Display for PhaseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for c in &self.coords {
            write!(f, "{c:.6e}, ")?;
        }
        write!(f, "1)")
    }
}

/// 7×7 homogeneous phase matrix.
///
/// Transfer matrices keep the last row equal to `(0, …, 0, 1)`; products and
/// inverses check that structure. Covariance matrices and transposes reuse
/// the type without that restriction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMatrix {
    elems: [[f64; PHASE_DIM]; PHASE_DIM],
}

impl Default for PhaseMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl PhaseMatrix {
    /// The zero matrix (including the homogeneous corner).
    pub fn zero() -> Self {
        Self {
            elems: [[0.0; PHASE_DIM]; PHASE_DIM],
        }
    }

    /// The identity map.
    pub fn identity() -> Self {
        let mut m = Self::zero();
        for i in 0..PHASE_DIM {
            m.elems[i][i] = 1.0;
        }
        m
    }

    /// Creates a matrix from raw row-major storage.
    pub fn from_rows(elems: [[f64; PHASE_DIM]; PHASE_DIM]) -> Self {
        Self { elems }
    }

    /// Homogeneous translation by `offset`: `T v = v + offset`.
    pub fn translation(offset: &PhaseVector) -> Self {
        let mut m = Self::identity();
        for (i, value) in offset.as_array().iter().enumerate() {
            m.elems[i][PhaseIndex::HOM.val()] = *value;
        }
        m
    }

    /// Block-diagonal transfer matrix assembled from three 2×2 plane blocks.
    pub fn from_blocks(x: [[f64; 2]; 2], y: [[f64; 2]; 2], z: [[f64; 2]; 2]) -> Self {
        let mut m = Self::identity();
        m.set_block(0, x);
        m.set_block(2, y);
        m.set_block(4, z);
        m
    }

    /// Overwrites the 2×2 diagonal block starting at `offset`.
    pub fn set_block(&mut self, offset: usize, block: [[f64; 2]; 2]) {
        for (i, row) in block.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                self.elems[offset + i][offset + j] = *value;
            }
        }
    }

    /// Returns the 2×2 diagonal block starting at `offset`.
    pub fn block(&self, offset: usize) -> [[f64; 2]; 2] {
        [
            [self.elems[offset][offset], self.elems[offset][offset + 1]],
            [
                self.elems[offset + 1][offset],
                self.elems[offset + 1][offset + 1],
            ],
        ]
    }

    /// Returns the element at `(row, col)`.
    pub fn get(&self, row: PhaseIndex, col: PhaseIndex) -> f64 {
        self.elems[row.val()][col.val()]
    }

    /// Sets the element at `(row, col)`.
    pub fn set(&mut self, row: PhaseIndex, col: PhaseIndex, value: f64) {
        self.elems[row.val()][col.val()] = value;
    }

    /// Returns the element at raw offsets.
    pub fn elem(&self, row: usize, col: usize) -> f64 {
        self.elems[row][col]
    }

    /// Sets the element at raw offsets.
    pub fn set_elem(&mut self, row: usize, col: usize, value: f64) {
        self.elems[row][col] = value;
    }

    /// Raw row-major storage.
    pub fn rows(&self) -> &[[f64; PHASE_DIM]; PHASE_DIM] {
        &self.elems
    }

    /// Returns true when the last row is exactly `(0, …, 0, 1)`.
    pub fn is_homogeneous(&self) -> bool {
        let last = &self.elems[PhaseIndex::HOM.val()];
        last[..PHYS_DIM].iter().all(|v| *v == 0.0) && last[PhaseIndex::HOM.val()] == 1.0
    }

    fn check_homogeneous(&self, operand: &str) -> Result<(), OlmError> {
        if self.is_homogeneous() {
            Ok(())
        } else {
            Err(OlmError::Model(
                ErrorInfo::new(
                    "hom-row",
                    "homogeneous row of a transfer matrix must be (0,…,0,1)",
                )
                .with_context("operand", operand),
            ))
        }
    }

    /// Plain 7×7 product without structural checks.
    fn product(&self, other: &PhaseMatrix) -> PhaseMatrix {
        let mut out = [[0.0; PHASE_DIM]; PHASE_DIM];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for k in 0..PHASE_DIM {
                    acc += self.elems[i][k] * other.elems[k][j];
                }
                *cell = acc;
            }
        }
        PhaseMatrix { elems: out }
    }

    /// Matrix product `self · other` of two transfer matrices.
    pub fn times(&self, other: &PhaseMatrix) -> Result<PhaseMatrix, OlmError> {
        self.check_homogeneous("lhs")?;
        other.check_homogeneous("rhs")?;
        Ok(self.product(other))
    }

    /// Applies the affine map to a phase vector.
    pub fn apply(&self, vector: &PhaseVector) -> PhaseVector {
        let v = vector.homogeneous();
        let mut coords = [0.0; PHYS_DIM];
        for (i, coord) in coords.iter_mut().enumerate() {
            *coord = (0..PHASE_DIM).map(|k| self.elems[i][k] * v[k]).sum();
        }
        PhaseVector::from_array(coords)
    }

    /// Transpose. The result generally violates the homogeneous row structure.
    pub fn transpose(&self) -> PhaseMatrix {
        let mut out = [[0.0; PHASE_DIM]; PHASE_DIM];
        for (i, row) in self.elems.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                out[j][i] = *value;
            }
        }
        PhaseMatrix { elems: out }
    }

    /// Conjugate transform `self · sigma · selfᵀ` used to push second moments.
    ///
    /// Only `self` needs the homogeneous row structure; `sigma` carries first
    /// moments in its last row and column.
    pub fn conjugate(&self, sigma: &PhaseMatrix) -> Result<PhaseMatrix, OlmError> {
        self.check_homogeneous("transform")?;
        Ok(self.product(sigma).product(&self.transpose()))
    }

    /// Element-wise sum.
    pub fn plus(&self, other: &PhaseMatrix) -> PhaseMatrix {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise difference.
    pub fn minus(&self, other: &PhaseMatrix) -> PhaseMatrix {
        self.zip_with(other, |a, b| a - b)
    }

    /// Scales every element.
    pub fn scale(&self, factor: f64) -> PhaseMatrix {
        let mut out = *self;
        for row in out.elems.iter_mut() {
            for cell in row.iter_mut() {
                *cell *= factor;
            }
        }
        out
    }

    fn zip_with(&self, other: &PhaseMatrix, op: impl Fn(f64, f64) -> f64) -> PhaseMatrix {
        let mut out = *self;
        for (row, other_row) in out.elems.iter_mut().zip(other.elems.iter()) {
            for (cell, rhs) in row.iter_mut().zip(other_row.iter()) {
                *cell = op(*cell, *rhs);
            }
        }
        out
    }

    /// Largest absolute element-wise difference against `other`.
    pub fn max_abs_diff(&self, other: &PhaseMatrix) -> f64 {
        self.elems
            .iter()
            .flatten()
            .zip(other.elems.iter().flatten())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Largest asymmetry `|M[i][j] - M[j][i]|` over the full matrix.
    pub fn max_asymmetry(&self) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..PHASE_DIM {
            for j in (i + 1)..PHASE_DIM {
                worst = worst.max((self.elems[i][j] - self.elems[j][i]).abs());
            }
        }
        worst
    }

    /// Returns true when every element is finite.
    pub fn is_finite(&self) -> bool {
        self.elems.iter().flatten().all(|v| v.is_finite())
    }

    /// The 6×6 linear block as a nalgebra matrix.
    pub fn linear_block(&self) -> Matrix6<f64> {
        Matrix6::from_fn(|i, j| self.elems[i][j])
    }

    /// Determinant of the 6×6 linear block.
    pub fn determinant(&self) -> f64 {
        self.linear_block().determinant()
    }

    /// Inverse of an affine transfer matrix.
    ///
    /// `[A b; 0 1]⁻¹ = [A⁻¹, −A⁻¹ b; 0 1]`. Fails with
    /// [`OlmError::SingularMatrix`] when `|det A|` falls below
    /// [`SINGULAR_TOLERANCE`].
    pub fn inverse(&self) -> Result<PhaseMatrix, OlmError> {
        self.check_homogeneous("inverse")?;
        let block = self.linear_block();
        let det = block.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_TOLERANCE {
            return Err(OlmError::SingularMatrix(
                ErrorInfo::new("singular-block", "6x6 linear block is not invertible")
                    .with_context("determinant", format!("{det:e}")),
            ));
        }
        let inv = block.lu().try_inverse().ok_or_else(|| {
            OlmError::SingularMatrix(
                ErrorInfo::new("lu-failure", "LU decomposition of the linear block failed")
                    .with_context("determinant", format!("{det:e}")),
            )
        })?;
        let mut out = PhaseMatrix::identity();
        for i in 0..PHYS_DIM {
            let mut shift = 0.0;
            for j in 0..PHYS_DIM {
                out.elems[i][j] = inv[(i, j)];
                shift -= inv[(i, j)] * self.elems[j][PhaseIndex::HOM.val()];
            }
            out.elems[i][PhaseIndex::HOM.val()] = shift;
        }
        Ok(out)
    }
}
