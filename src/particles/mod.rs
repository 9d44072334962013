//! Particles module - owned particle configurations of the single-box and two-box ensembles.
//!
//! Particles are stored as neutral sets of ions (charge +1) and electrons (charge -1).
//! Committed coordinates always lie inside their owning cell.

mod placement;
mod single;
mod two_box;

pub use placement::{lattice_positions, random_positions};
pub use single::SingleBoxParticles;
pub use two_box::TwoBoxParticles;
