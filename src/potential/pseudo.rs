//! Temperature-fitted electron-ion pseudo-potential.
//!
//! Below the lacing point the attraction follows a soft power fit that joins the Coulomb
//! tail at 185 Bohr. Like-charge pairs are Coulomb, clamped below two Bohr.

use super::{coulomb, PairKind, PotentialModel};

/// Junction of the power-law fit and the Coulomb tail, Bohr.
pub const LACING_POINT: f64 = 185.0;

const FIT_OFFSET: f64 = -24.836465138387798;
const FIT_SLOPE: f64 = 1.6042494381847763;
const LIKE_CHARGE_CLAMP: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PseudoPotential {
    pub temperature: f64,
}

impl PseudoPotential {
    pub fn new(temperature: f64) -> Self {
        Self { temperature }
    }
}

impl PotentialModel for PseudoPotential {
    fn name(&self) -> &'static str {
        "pseudo"
    }

    fn pair_potential(&self, r: f64, kind: PairKind) -> f64 {
        match kind {
            PairKind::IonElectron if r < LACING_POINT => FIT_OFFSET + FIT_SLOPE * r.powf(0.3),
            PairKind::IonElectron => -coulomb(r, self.temperature),
            _ => coulomb(r.max(LIKE_CHARGE_CLAMP), self.temperature),
        }
    }

    fn pair_energy(&self, r: f64, kind: PairKind) -> f64 {
        match kind {
            PairKind::IonElectron if r < LACING_POINT => 0.0,
            _ => self.pair_potential(r, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_region() {
        let pp = PseudoPotential::new(10_000.0);
        assert_relative_eq!(pp.pair_potential(1.0, PairKind::IonElectron), FIT_OFFSET + FIT_SLOPE);
        assert_eq!(pp.pair_energy(100.0, PairKind::IonElectron), 0.0);
        assert!(pp.pair_potential(200.0, PairKind::IonElectron) < 0.0);
        assert_relative_eq!(
            pp.pair_energy(200.0, PairKind::IonElectron),
            pp.pair_potential(200.0, PairKind::IonElectron)
        );
    }

    #[test]
    fn test_like_charge_clamp_at_two_bohr() {
        let pp = PseudoPotential::new(10_000.0);
        assert_relative_eq!(
            pp.pair_potential(0.5, PairKind::IonIon),
            pp.pair_potential(2.0, PairKind::ElectronElectron)
        );
    }
}
