#![deny(missing_docs)]
#![doc = "Trackers, step policies and collective space-charge kicks for the online model."]

/// YAML tracker configuration and state recording policies.
pub mod config;
/// Direct-sum Coulomb impulses for macro-particle ensembles.
pub mod coulomb;
/// Carlson symmetric elliptic integrals.
pub mod ellint;
/// Element sub-division rules.
pub mod policy;
/// Linear space charge of uniformly filled ellipsoids.
pub mod space_charge;
/// Tracker sum type and per-element propagation.
pub mod tracker;

pub use config::{TrackerConfig, UpdatePolicy};
pub use coulomb::coulomb_impulses;
pub use ellint::carlson_rd;
pub use policy::{plan, step_count, StepPlan};
pub use space_charge::{space_charge_matrix, spatial_correlation, UPRIGHT_CORRELATION};
pub use tracker::Tracker;
