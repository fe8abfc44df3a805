#![deny(missing_docs)]
#![doc = "Probe variants, state snapshots and trajectory history for the online model."]

/// Element-counting probe.
pub mod diagnostic;
/// Macro-particle ensembles.
pub mod ensemble;
/// Covariance envelopes.
pub mod envelope;
/// Canonical hashing helpers for probe states and trajectories.
pub mod hash;
/// Single-particle probe.
pub mod particle;
/// Probe sum type and collective kicks.
pub mod probe;
/// Serde helpers for JSON artefacts.
#[path = "serde.rs"]
pub mod serde_io;
/// Immutable state snapshots.
pub mod state;
/// Position-ordered state history.
pub mod trajectory;
/// Transfer-map probe.
pub mod transfer;
/// Twiss-parameter probe.
pub mod twiss;

pub use diagnostic::DiagnosticProbe;
pub use ensemble::{EnsembleProbe, MacroParticle};
pub use envelope::EnvelopeProbe;
pub use particle::ParticleProbe;
pub use probe::{Kick, Probe, ProbeCore, ProbeKind};
pub use state::{ProbeState, StateData};
pub use trajectory::Trajectory;
pub use transfer::TransferMapProbe;
pub use twiss::TwissProbe;
