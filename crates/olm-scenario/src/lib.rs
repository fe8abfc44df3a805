#![deny(missing_docs)]
#![doc = "Lattice and scenario driver, YAML run descriptions and trajectory checkpoints."]

/// Trajectory checkpoints with canonical hashes.
pub mod checkpoint;
/// YAML lattice, probe and run descriptions.
pub mod config;
/// Windowed propagation over a lattice.
pub mod driver;
/// Ordered element containers and lattice-wide resync.
pub mod lattice;
/// Scenario owning a lattice, tracker and probe.
pub mod scenario;

pub use checkpoint::{checkpoint_path, TrajectoryCheckpoint};
pub use config::{ElementSpec, LatticeSpec, ProbeSpec, ScenarioConfig, SpeciesSpec};
pub use driver::{propagate, window, RunFailure};
pub use lattice::Lattice;
pub use scenario::Scenario;
