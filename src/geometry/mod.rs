//! Geometry module - periodic cubic cells and minimum-image arithmetic.

mod periodic;

pub use periodic::{fold_position, wrap, PeriodicBox};
