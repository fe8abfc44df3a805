use nalgebra::{Matrix3, SymmetricEigen};
use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{CovarianceMatrix, PhaseIndex, PhaseMatrix};

use crate::ellint::carlson_rd;

/// Below this summed squared correlation the beam is treated as upright.
pub const UPRIGHT_CORRELATION: f64 = 0.01;

/// `5^{3/2}`: rms-to-uniform-ellipsoid normalisation.
const UNIFORM_BEAM: f64 = 11.180_339_887_498_949;

const POSITIONS: [PhaseIndex; 3] = [PhaseIndex::X, PhaseIndex::Y, PhaseIndex::Z];
const MOMENTA: [PhaseIndex; 3] = [PhaseIndex::XP, PhaseIndex::YP, PhaseIndex::ZP];

/// Summed squared correlation coefficients between the spatial planes.
pub fn spatial_correlation(covariance: &CovarianceMatrix) -> f64 {
    use PhaseIndex::{X, Y, Z};
    let m = |a, b| covariance.central_moment(a, b);
    let (xx, yy, zz) = (m(X, X), m(Y, Y), m(Z, Z));
    let (xy, xz, yz) = (m(X, Y), m(X, Z), m(Y, Z));
    xy * xy / (xx * yy) + xz * xz / (xx * zz) + yz * yz / (yy * zz)
}

/// Linear space-charge kick of a uniformly filled ellipsoid over `length`.
///
/// `perveance` is the generalized perveance `K` of the probe and `gamma`
/// its relativistic factor. The kick is built around the beam centroid;
/// a zero perveance or length yields the identity.
pub fn space_charge_matrix(
    covariance: &CovarianceMatrix,
    gamma: f64,
    perveance: f64,
    length: f64,
) -> Result<PhaseMatrix, OlmError> {
    if perveance == 0.0 || length == 0.0 {
        return Ok(PhaseMatrix::identity());
    }
    let corr = spatial_correlation(covariance);
    let kick = if corr < UPRIGHT_CORRELATION {
        upright(covariance, gamma, perveance, length)
    } else {
        tilted(covariance, gamma, perveance, length)
    }
    .map_err(|err| degenerate(err.info().message.clone()))?;
    if !kick.is_finite() {
        return Err(degenerate("space-charge kick is not finite".into()));
    }
    Ok(kick)
}

fn degenerate(message: String) -> OlmError {
    OlmError::Model(
        ErrorInfo::new("space-charge-degenerate", message)
            .with_hint("space charge needs a beam with non-zero spatial extent"),
    )
}

fn kick_matrix(strengths: [f64; 3]) -> PhaseMatrix {
    let mut m = PhaseMatrix::identity();
    for ((pos, mom), k) in POSITIONS.into_iter().zip(MOMENTA).zip(strengths) {
        m.set(mom, pos, k);
    }
    m
}

/// Defocusing constants `γ R_D(·)/5^{3/2}` for semi-axis moments `(a², b², c²)`.
fn defocusing(gamma: f64, a2: f64, b2: f64, c2: f64) -> Result<[f64; 3], OlmError> {
    Ok([
        gamma * carlson_rd(b2, c2, a2)? / UNIFORM_BEAM,
        gamma * carlson_rd(c2, a2, b2)? / UNIFORM_BEAM,
        gamma * carlson_rd(a2, b2, c2)? / UNIFORM_BEAM,
    ])
}

fn upright(
    covariance: &CovarianceMatrix,
    gamma: f64,
    perveance: f64,
    length: f64,
) -> Result<PhaseMatrix, OlmError> {
    use PhaseIndex::{X, Y, Z};
    let xx = covariance.central_moment(X, X);
    let yy = covariance.central_moment(Y, Y);
    let zz = gamma * gamma * covariance.central_moment(Z, Z);
    let kn = defocusing(gamma, xx, yy, zz)?;
    let kick = kick_matrix(kn.map(|k| length * perveance * k));

    let mean = covariance.mean();
    PhaseMatrix::translation(&mean)
        .times(&kick)?
        .times(&PhaseMatrix::translation(&mean.negate()))
}

fn tilted(
    covariance: &CovarianceMatrix,
    gamma: f64,
    perveance: f64,
    length: f64,
) -> Result<PhaseMatrix, OlmError> {
    // Lab to beam rest frame: z and z' stretch by γ.
    let mut lorentz = PhaseMatrix::identity();
    lorentz.set(PhaseIndex::Z, PhaseIndex::Z, gamma);
    lorentz.set(PhaseIndex::ZP, PhaseIndex::ZP, gamma);
    let beam = CovarianceMatrix::new(lorentz.conjugate(covariance.as_matrix())?)?;
    let translate = PhaseMatrix::translation(&beam.mean().negate());

    let spatial = Matrix3::from_fn(|i, j| beam.central_moment(POSITIONS[i], POSITIONS[j]));
    let eigen = SymmetricEigen::new(spatial);
    let rotation3 = eigen.eigenvectors.transpose();
    let mut rotation = PhaseMatrix::identity();
    for i in 0..3 {
        for j in 0..3 {
            rotation.set(POSITIONS[i], POSITIONS[j], rotation3[(i, j)]);
            rotation.set(MOMENTA[i], MOMENTA[j], rotation3[(i, j)]);
        }
    }
    let moments = eigen.eigenvalues;
    let kn = defocusing(gamma, moments[0], moments[1], moments[2])?;
    let kick = kick_matrix(kn.map(|k| length * perveance * k));

    let to_beam = rotation.times(&translate)?.times(&lorentz)?;
    to_beam.inverse()?.times(&kick)?.times(&to_beam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use olm_core::{PhaseVector, Twiss};

    fn upright_beam() -> CovarianceMatrix {
        let tx = Twiss::new(0.0, 1.0, 1e-6);
        let ty = Twiss::new(0.0, 2.0, 1e-6);
        let tz = Twiss::new(0.0, 4.0, 2e-6);
        CovarianceMatrix::from_twiss(&tx, &ty, &tz).unwrap()
    }

    #[test]
    fn zero_perveance_is_identity() {
        let kick = space_charge_matrix(&upright_beam(), 1.1, 0.0, 0.1).unwrap();
        assert_eq!(kick, PhaseMatrix::identity());
    }

    #[test]
    fn upright_kick_defocuses_every_plane() {
        let kick = space_charge_matrix(&upright_beam(), 1.05, 1e-9, 0.01).unwrap();
        assert!(kick.get(PhaseIndex::XP, PhaseIndex::X) > 0.0);
        assert!(kick.get(PhaseIndex::YP, PhaseIndex::Y) > 0.0);
        assert!(kick.get(PhaseIndex::ZP, PhaseIndex::Z) > 0.0);
        // Smaller plane is pushed harder.
        assert!(kick.get(PhaseIndex::XP, PhaseIndex::X) > kick.get(PhaseIndex::YP, PhaseIndex::Y));
    }

    #[test]
    fn tilted_path_agrees_with_upright_on_upright_beams() {
        let beam = upright_beam();
        let gamma = 1.2;
        let a = upright(&beam, gamma, 1e-9, 0.02).unwrap();
        let b = tilted(&beam, gamma, 1e-9, 0.02).unwrap();
        assert!(a.max_abs_diff(&b) < 1e-9 * a.get(PhaseIndex::XP, PhaseIndex::X).abs());
    }

    #[test]
    fn centroid_offset_keeps_kick_centred() {
        let tx = Twiss::new(0.0, 1.0, 1e-6);
        let centroid = PhaseVector::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0);
        let beam = CovarianceMatrix::from_twiss_with_centroid(&tx, &tx, &tx, &centroid).unwrap();
        let kick = space_charge_matrix(&beam, 1.0, 1e-9, 0.01).unwrap();
        let out = kick.apply(&centroid);
        assert!(out.get(PhaseIndex::XP).abs() < 1e-18);
    }

    #[test]
    fn flat_beam_is_degenerate() {
        let tx = Twiss::new(0.0, 1.0, 1e-6);
        let mut sigma = *CovarianceMatrix::from_twiss(&tx, &tx, &tx).unwrap().as_matrix();
        sigma.set(PhaseIndex::X, PhaseIndex::X, 0.0);
        sigma.set(PhaseIndex::Y, PhaseIndex::Y, 0.0);
        let beam = CovarianceMatrix::new(sigma).unwrap();
        let err = space_charge_matrix(&beam, 1.0, 1e-9, 0.01).unwrap_err();
        assert_eq!(err.info().code, "space-charge-degenerate");
    }
}
