//! Lennard-Jones 12-6 fluid used to validate the two-box machinery.

use super::{PairKind, PotentialModel};
use crate::constants::BOHR;

/// Separations below this are treated as this, Bohr.
const MIN_DISTANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    /// Well depth, kT
    pub epsilon: f64,
    /// Particle diameter, Bohr
    pub sigma: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        Self { epsilon, sigma }
    }

    /// Diameter chosen so that the reduced density `ρ* = 2nσ³` equals `ro_star`.
    ///
    /// # Arguments
    /// * `epsilon` - well depth in kT
    /// * `ro_star` - reduced density
    /// * `density` - per-species number density, cm⁻³
    pub fn from_density(epsilon: f64, ro_star: f64, density: f64) -> Self {
        let sigma = (ro_star / (2.0 * density)).cbrt() / BOHR;
        Self::new(epsilon, sigma)
    }
}

impl PotentialModel for LennardJones {
    fn name(&self) -> &'static str {
        "lennard-jones"
    }

    fn pair_potential(&self, r: f64, _kind: PairKind) -> f64 {
        let s6 = (self.sigma / r.max(MIN_DISTANCE)).powi(6);
        4.0 * self.epsilon * (s6 * s6 - s6)
    }

    fn pair_energy(&self, r: f64, kind: PairKind) -> f64 {
        self.pair_potential(r, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimum_at_two_to_one_sixth_sigma() {
        let lj = LennardJones::new(1.5, 3.0);
        let r_min = 2.0_f64.powf(1.0 / 6.0) * 3.0;
        assert_relative_eq!(lj.pair_potential(r_min, PairKind::IonIon), -1.5, epsilon = 1e-12);
        assert_relative_eq!(lj.pair_potential(3.0, PairKind::IonElectron), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sigma_from_reduced_density() {
        let lj = LennardJones::from_density(1.0, 0.1, 1e21);
        let sigma_cm = lj.sigma * BOHR;
        assert_relative_eq!(2.0 * 1e21 * sigma_cm.powi(3), 0.1, max_relative = 1e-10);
    }
}
