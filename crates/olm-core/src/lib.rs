#![deny(missing_docs)]
#![doc = "Core phase-space algebra, kinematics and error types for the online model."]

pub mod covariance;
pub mod errors;
pub mod map;
pub mod phase;
pub mod provenance;
pub mod rng;
pub mod species;

pub use covariance::{CovarianceMatrix, Twiss};
pub use errors::{ErrorInfo, OlmError};
pub use map::{PhaseMap, SecondOrderTensor};
pub use phase::{PhaseIndex, PhaseMatrix, PhaseVector, PHASE_DIM, PHYS_DIM, SINGULAR_TOLERANCE};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use species::{ProbeView, Species, LIGHT_SPEED};
