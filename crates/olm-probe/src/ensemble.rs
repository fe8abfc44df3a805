use nalgebra::{Matrix6, SymmetricEigen, Vector6};
use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::{
    CovarianceMatrix, PhaseIndex, PhaseMap, PhaseMatrix, PhaseVector, RngHandle, Species,
    PHASE_DIM, PHYS_DIM,
};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeCore;
use crate::state::StateData;

/// Macro-particle: a charge (C) and its phase coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroParticle {
    /// Charge carried by the macro-particle (C).
    pub charge: f64,
    /// Phase coordinates.
    pub coords: PhaseVector,
}

impl MacroParticle {
    /// Creates a macro-particle.
    pub fn new(charge: f64, coords: PhaseVector) -> Self {
        Self { charge, coords }
    }
}

/// Ensemble of macro-particles sharing one species.
///
/// The ensemble is never empty; [`EnsembleProbe::new`] rejects an empty set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleProbe {
    /// Shared kinematic state.
    pub core: ProbeCore,
    particles: Vec<MacroParticle>,
}

impl EnsembleProbe {
    /// Builds an ensemble ordered by increasing phase-space norm.
    pub fn new(species: Species, particles: Vec<MacroParticle>) -> Result<Self, OlmError> {
        if particles.is_empty() {
            return Err(OlmError::Config(
                ErrorInfo::new("empty-ensemble", "an ensemble needs at least one particle")
                    .with_hint("populate the ensemble before seeding the probe"),
            ));
        }
        if let Some(idx) = particles.iter().position(|p| !p.coords.is_finite()) {
            return Err(OlmError::Config(
                ErrorInfo::new("non-finite-particle", "particle coordinates must be finite")
                    .with_context("index", idx.to_string()),
            ));
        }
        let mut probe = Self {
            core: ProbeCore::new(species),
            particles,
        };
        probe.sort_by_norm();
        Ok(probe)
    }

    /// Draws `count` particles from the Gaussian described by `covariance`.
    ///
    /// Particle `i` comes from substream `i` of `seed`, so a smaller draw is a
    /// subset of a larger one. `bunch_charge` (C) is split evenly across the
    /// particles.
    pub fn gaussian(
        species: Species,
        covariance: &CovarianceMatrix,
        count: usize,
        bunch_charge: f64,
        seed: u64,
    ) -> Result<Self, OlmError> {
        if count == 0 {
            return Self::new(species, Vec::new());
        }
        let central = covariance.central();
        let block = Matrix6::from_fn(|i, j| central.as_matrix().elem(i, j));
        let eigen = SymmetricEigen::new(block);
        let roots = eigen.eigenvalues.map(|v| v.max(0.0).sqrt());
        let factor = eigen.eigenvectors * Matrix6::from_diagonal(&roots);
        let mean = covariance.mean();
        let charge = bunch_charge / count as f64;
        let particles = (0..count)
            .map(|i| {
                let mut rng = RngHandle::substream(seed, i as u64);
                let normal = Vector6::from_fn(|_, _| rng.standard_normal());
                let offset = factor * normal;
                let mut coords = [0.0; PHYS_DIM];
                for (i, c) in coords.iter_mut().enumerate() {
                    *c = offset[i];
                }
                MacroParticle::new(charge, mean.plus(&PhaseVector::from_array(coords)))
            })
            .collect();
        Self::new(species, particles)
    }

    /// Particles in ensemble order.
    pub fn particles(&self) -> &[MacroParticle] {
        &self.particles
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Mean phase coordinates.
    pub fn centroid(&self) -> PhaseVector {
        let n = self.particles.len() as f64;
        let sum = self
            .particles
            .iter()
            .fold(PhaseVector::zero(), |acc, p| acc.plus(&p.coords));
        sum.times(1.0 / n)
    }

    /// Second moments `<z zᵀ>` in homogeneous form.
    pub fn covariance(&self) -> Result<CovarianceMatrix, OlmError> {
        let n = self.particles.len() as f64;
        let mut sum = PhaseMatrix::zero();
        for particle in &self.particles {
            sum = sum.plus(&particle.coords.outer_product(&particle.coords));
        }
        let mut moments = sum.scale(1.0 / n);
        moments.set(PhaseIndex::HOM, PhaseIndex::HOM, 1.0);
        for i in 0..PHASE_DIM {
            for j in (i + 1)..PHASE_DIM {
                let avg = 0.5 * (moments.elem(i, j) + moments.elem(j, i));
                moments.set_elem(i, j, avg);
                moments.set_elem(j, i, avg);
            }
        }
        CovarianceMatrix::new(moments)
    }

    pub(crate) fn sort_by_norm(&mut self) {
        self.particles
            .sort_by(|a, b| a.coords.norm2().total_cmp(&b.coords.norm2()));
    }

    pub(crate) fn advance(&mut self, map: &PhaseMap) {
        for particle in &mut self.particles {
            particle.coords = map.apply(&particle.coords);
        }
    }

    pub(crate) fn apply_impulses(&mut self, impulses: &[[f64; 3]]) -> Result<(), OlmError> {
        if impulses.len() != self.particles.len() {
            return Err(OlmError::IncompatibleProbe(
                ErrorInfo::new("impulse-count", "impulse count does not match the ensemble")
                    .with_context("impulses", impulses.len().to_string())
                    .with_context("particles", self.particles.len().to_string()),
            ));
        }
        for (particle, kick) in self.particles.iter_mut().zip(impulses) {
            let c = *particle.coords.as_array();
            particle.coords = PhaseVector::new(
                c[0],
                c[1] + kick[0],
                c[2],
                c[3] + kick[1],
                c[4],
                c[5] + kick[2],
            );
        }
        Ok(())
    }

    pub(crate) fn state_data(&self) -> Result<StateData, OlmError> {
        Ok(StateData::Ensemble {
            count: self.particles.len(),
            centroid: self.centroid(),
            covariance: self.covariance()?,
        })
    }
}
