use olm_core::species::{ELEMENTARY_CHARGE, VACUUM_PERMITTIVITY};
use olm_core::{PhaseIndex, ProbeView};
use olm_probe::MacroParticle;
use rayon::prelude::*;

/// Direct-sum Coulomb impulses `(Δx', Δy', Δz')` for every particle.
///
/// Fields are summed pairwise in the bunch rest frame (longitudinal
/// separations stretched by γ) with Plummer softening `softening`, then
/// converted to divergence changes over `length`:
/// `Δx' = q E'_x l / (β²γ² E_r)` and `Δz' = q E'_z l / (β²γ³ E_r)`.
pub fn coulomb_impulses(
    particles: &[MacroParticle],
    view: &ProbeView,
    length: f64,
    softening: f64,
) -> Vec<[f64; 3]> {
    if length == 0.0 || particles.len() < 2 {
        return vec![[0.0; 3]; particles.len()];
    }
    let gamma = view.gamma();
    let beta = view.beta();
    let rest_energy_j = view.rest_energy * ELEMENTARY_CHARGE;
    let charge = view.charge * ELEMENTARY_CHARGE;
    let coulomb = 1.0 / (4.0 * std::f64::consts::PI * VACUUM_PERMITTIVITY);
    let transverse = charge * length / (beta * beta * gamma * gamma * rest_energy_j);
    let longitudinal = transverse / gamma;
    let eps2 = softening * softening;

    let rest_frame: Vec<[f64; 3]> = particles
        .iter()
        .map(|p| {
            [
                p.coords.get(PhaseIndex::X),
                p.coords.get(PhaseIndex::Y),
                gamma * p.coords.get(PhaseIndex::Z),
            ]
        })
        .collect();

    (0..particles.len())
        .into_par_iter()
        .map(|i| {
            let ri = rest_frame[i];
            let mut field = [0.0; 3];
            for (j, rj) in rest_frame.iter().enumerate() {
                if i == j {
                    continue;
                }
                let d = [ri[0] - rj[0], ri[1] - rj[1], ri[2] - rj[2]];
                let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2] + eps2;
                let scale = coulomb * particles[j].charge / (r2 * r2.sqrt());
                for (f, dk) in field.iter_mut().zip(d) {
                    *f += scale * dk;
                }
            }
            [
                transverse * field[0],
                transverse * field[1],
                longitudinal * field[2],
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use olm_core::{PhaseVector, Species};

    #[test]
    fn pair_repels_symmetrically() {
        let view = Species::proton(2.5e6).view(0.0);
        let particles = [
            MacroParticle::new(1e-12, PhaseVector::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0)),
            MacroParticle::new(1e-12, PhaseVector::new(-1e-3, 0.0, 0.0, 0.0, 0.0, 0.0)),
        ];
        let kicks = coulomb_impulses(&particles, &view, 0.01, 1e-6);
        assert!(kicks[0][0] > 0.0);
        assert!((kicks[0][0] + kicks[1][0]).abs() < 1e-12 * kicks[0][0]);
        assert_eq!(kicks[0][1], 0.0);
    }

    #[test]
    fn single_particle_feels_nothing() {
        let view = Species::proton(2.5e6).view(0.0);
        let particles = [MacroParticle::new(1e-12, PhaseVector::zero())];
        assert_eq!(coulomb_impulses(&particles, &view, 0.01, 1e-6), vec![[0.0; 3]]);
    }
}
