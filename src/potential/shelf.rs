//! Cutoff ("shelf") Coulomb potential.
//!
//! The electron-ion attraction is cut to a constant plateau `-ε` (kT) below the distance
//! where the bare Coulomb attraction reaches `-ε`. Like-charge repulsion is pure Coulomb,
//! clamped below one Bohr. Inside the plateau the attraction enters the Metropolis weight
//! but contributes nothing to the energy.

use super::{coulomb, PairKind, PotentialModel};
use crate::constants::SCALE_FACTOR;

/// Minimal like-charge separation, Bohr.
const LIKE_CHARGE_CLAMP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shelf {
    /// Temperature, K
    pub temperature: f64,
    /// Plateau depth, kT
    pub epsilon: f64,
    /// Plateau edge, Bohr
    cutoff: f64,
}

impl Shelf {
    pub fn new(temperature: f64, epsilon: f64) -> Self {
        Self {
            temperature,
            epsilon,
            cutoff: SCALE_FACTOR / (temperature * epsilon),
        }
    }

    /// Distance below which the electron-ion attraction is flat.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl PotentialModel for Shelf {
    fn name(&self) -> &'static str {
        "shelf"
    }

    fn pair_potential(&self, r: f64, kind: PairKind) -> f64 {
        match kind {
            PairKind::IonElectron if r < self.cutoff => -self.epsilon,
            PairKind::IonElectron => -coulomb(r, self.temperature),
            _ => coulomb(r.max(LIKE_CHARGE_CLAMP), self.temperature),
        }
    }

    fn pair_energy(&self, r: f64, kind: PairKind) -> f64 {
        match kind {
            PairKind::IonElectron if r < self.cutoff => 0.0,
            _ => self.pair_potential(r, kind),
        }
    }
}
