#![deny(missing_docs)]
#![doc = "Beamline elements, their transfer maps and parameter synchronization."]

/// Sector bending magnets.
pub mod dipole;
/// Field-free drifts.
pub mod drift;
/// Element trait, kind tags and alignment.
pub mod element;
/// Two-by-two plane matrices.
pub mod optics;
/// Electromagnetic and permanent-magnet quadrupoles.
pub mod quadrupole;
/// Thin RF gaps.
pub mod rfgap;
/// Design and live parameter sources.
pub mod sync;
/// Thin lenses and markers.
pub mod thin;

pub use dipole::SectorDipole;
pub use drift::Drift;
pub use element::{check_sub_length, Alignment, Element, ElementKind, LENGTH_TOLERANCE};
pub use quadrupole::{PermanentMagnetQuad, Quadrupole};
pub use rfgap::RfGap;
pub use sync::{DesignOnly, ParameterSnapshot, ParameterSource, Setting, SyncMode};
pub use thin::{Marker, ThinLens};
