//! Second-moment matrices and Courant-Snyder (Twiss) parameters.

use nalgebra::{Matrix6, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, OlmError};
use crate::phase::{PhaseIndex, PhaseMatrix, PhaseVector, PHYS_DIM};

/// Tolerance used when validating symmetry of a covariance matrix.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Courant-Snyder parameters of one phase plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twiss {
    /// Correlation parameter α.
    pub alpha: f64,
    /// Envelope function β (m).
    pub beta: f64,
    /// RMS emittance ε (m·rad).
    pub emittance: f64,
}

impl Twiss {
    /// Creates a Twiss triple.
    pub fn new(alpha: f64, beta: f64, emittance: f64) -> Self {
        Self {
            alpha,
            beta,
            emittance,
        }
    }

    /// Twiss γ = (1 + α²) / β.
    pub fn gamma(&self) -> f64 {
        (1.0 + self.alpha * self.alpha) / self.beta
    }

    /// The 2×2 second-moment block `ε [[β, −α], [−α, γ]]`.
    pub fn correlation_matrix(&self) -> [[f64; 2]; 2] {
        let e = self.emittance;
        [
            [e * self.beta, -e * self.alpha],
            [-e * self.alpha, e * self.gamma()],
        ]
    }

    /// Checks that β is positive and ε is non-negative.
    pub fn validate(&self) -> Result<(), OlmError> {
        if !(self.beta > 0.0) || !(self.emittance >= 0.0) || !self.alpha.is_finite() {
            return Err(OlmError::Config(
                ErrorInfo::new("twiss-invalid", "Twiss parameters require β > 0 and ε ≥ 0")
                    .with_context("alpha", self.alpha.to_string())
                    .with_context("beta", self.beta.to_string())
                    .with_context("emittance", self.emittance.to_string()),
            ));
        }
        Ok(())
    }
}

/// Symmetric matrix of second moments `<z zᵀ>` in homogeneous coordinates.
///
/// The homogeneous row and column hold the first moments (centroid) and the
/// corner element is `1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PhaseMatrix", into = "PhaseMatrix")]
pub struct CovarianceMatrix {
    matrix: PhaseMatrix,
}

impl TryFrom<PhaseMatrix> for CovarianceMatrix {
    type Error = OlmError;

    fn try_from(matrix: PhaseMatrix) -> Result<Self, Self::Error> {
        Self::new(matrix)
    }
}

impl From<CovarianceMatrix> for PhaseMatrix {
    fn from(covariance: CovarianceMatrix) -> Self {
        covariance.matrix
    }
}

impl CovarianceMatrix {
    /// Wraps a phase matrix after checking symmetry and positive
    /// semi-definiteness of the central block.
    pub fn new(matrix: PhaseMatrix) -> Result<Self, OlmError> {
        let asym = matrix.max_asymmetry();
        if asym > SYMMETRY_TOLERANCE || !matrix.is_finite() {
            return Err(OlmError::Model(
                ErrorInfo::new("covariance-asymmetric", "covariance matrix is not symmetric")
                    .with_context("asymmetry", format!("{asym:e}")),
            ));
        }
        let covariance = Self { matrix };
        if !covariance.is_positive_semidefinite() {
            return Err(OlmError::Model(
                ErrorInfo::new(
                    "covariance-not-psd",
                    "covariance matrix is not positive semi-definite",
                )
                .with_context("min_eigenvalue", format!("{:e}", covariance.min_eigenvalue())),
            ));
        }
        Ok(covariance)
    }

    /// Builds an uncorrelated, centred covariance from per-plane Twiss parameters.
    pub fn from_twiss(x: &Twiss, y: &Twiss, z: &Twiss) -> Result<Self, OlmError> {
        for twiss in [x, y, z] {
            twiss.validate()?;
        }
        let mut matrix = PhaseMatrix::from_blocks(
            x.correlation_matrix(),
            y.correlation_matrix(),
            z.correlation_matrix(),
        );
        matrix.set(PhaseIndex::HOM, PhaseIndex::HOM, 1.0);
        Self::new(matrix)
    }

    /// Builds a covariance from Twiss parameters about a non-zero centroid.
    pub fn from_twiss_with_centroid(
        x: &Twiss,
        y: &Twiss,
        z: &Twiss,
        centroid: &PhaseVector,
    ) -> Result<Self, OlmError> {
        let central = Self::from_twiss(x, y, z)?;
        let mut sigma = central.matrix;
        sigma.set(PhaseIndex::HOM, PhaseIndex::HOM, 0.0);
        Self::new(sigma.plus(&centroid.outer_product(centroid)))
    }

    /// Underlying phase matrix.
    pub fn as_matrix(&self) -> &PhaseMatrix {
        &self.matrix
    }

    /// Element access.
    pub fn get(&self, row: PhaseIndex, col: PhaseIndex) -> f64 {
        self.matrix.get(row, col)
    }

    /// First moments (beam centroid).
    pub fn mean(&self) -> PhaseVector {
        let mut coords = [0.0; PHYS_DIM];
        for (i, coord) in coords.iter_mut().enumerate() {
            *coord = self.matrix.elem(i, PhaseIndex::HOM.val());
        }
        PhaseVector::from_array(coords)
    }

    /// Central covariance `<z zᵀ> − <z><z>ᵀ` with a unit homogeneous corner.
    pub fn central(&self) -> CovarianceMatrix {
        let mean = self.mean();
        let mut central = self.matrix.minus(&mean.outer_product(&mean));
        central.set(PhaseIndex::HOM, PhaseIndex::HOM, 1.0);
        CovarianceMatrix { matrix: central }
    }

    /// Central second moment between two physical coordinates.
    pub fn central_moment(&self, a: PhaseIndex, b: PhaseIndex) -> f64 {
        let mean = self.mean();
        self.matrix.get(a, b) - mean.get(a) * mean.get(b)
    }

    /// RMS sizes `(σx, σy, σz)`.
    pub fn rms_sizes(&self) -> [f64; 3] {
        [PhaseIndex::X, PhaseIndex::Y, PhaseIndex::Z]
            .map(|idx| self.central_moment(idx, idx).max(0.0).sqrt())
    }

    /// RMS emittances per plane, `√(σ11 σ22 − σ12²)`.
    pub fn rms_emittances(&self) -> [f64; 3] {
        let central = self.central();
        [0usize, 2, 4].map(|o| {
            let b = central.matrix.block(o);
            (b[0][0] * b[1][1] - b[0][1] * b[1][0]).max(0.0).sqrt()
        })
    }

    /// Twiss parameters per plane. Planes with zero emittance are rejected.
    pub fn twiss(&self) -> Result<[Twiss; 3], OlmError> {
        let central = self.central();
        let emittances = self.rms_emittances();
        let mut out = [Twiss::new(0.0, 1.0, 0.0); 3];
        for (plane, (twiss, emit)) in out.iter_mut().zip(emittances).enumerate() {
            if !(emit > 0.0) {
                return Err(OlmError::Model(
                    ErrorInfo::new("zero-emittance", "plane has zero rms emittance")
                        .with_context("plane", plane.to_string()),
                ));
            }
            let b = central.matrix.block(2 * plane);
            *twiss = Twiss::new(-b[0][1] / emit, b[0][0] / emit, emit);
        }
        Ok(out)
    }

    /// Smallest eigenvalue of the central 6×6 block.
    pub fn min_eigenvalue(&self) -> f64 {
        let central = self.central();
        let block = Matrix6::from_fn(|i, j| central.matrix.elem(i, j));
        SymmetricEigen::new(block).eigenvalues.min()
    }

    /// Checks positive semi-definiteness of the central block with a relative tolerance.
    pub fn is_positive_semidefinite(&self) -> bool {
        let central = self.central();
        let scale = (0..PHYS_DIM)
            .map(|i| central.matrix.elem(i, i).abs())
            .fold(0.0, f64::max);
        self.min_eigenvalue() >= -1e-9 * scale.max(f64::MIN_POSITIVE)
    }

    /// Pushes the moments through a transfer matrix: `σ ← M σ Mᵀ`.
    pub fn transform(&self, map: &PhaseMatrix) -> Result<CovarianceMatrix, OlmError> {
        let mut next = map.conjugate(&self.matrix)?;
        symmetrize(&mut next);
        Ok(CovarianceMatrix { matrix: next })
    }
}

/// Averages `M[i][j]` and `M[j][i]` to remove round-off asymmetry.
fn symmetrize(matrix: &mut PhaseMatrix) {
    for i in 0..crate::phase::PHASE_DIM {
        for j in (i + 1)..crate::phase::PHASE_DIM {
            let avg = 0.5 * (matrix.elem(i, j) + matrix.elem(j, i));
            matrix.set_elem(i, j, avg);
            matrix.set_elem(j, i, avg);
        }
    }
}
