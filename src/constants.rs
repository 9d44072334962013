//! Physical constants (CGS) and fixed file names shared by all ensembles.

/// Bohr radius, cm.
pub const BOHR: f64 = 5.2917721092e-9;

/// Elementary charge, statC.
pub const ELECTRON_CHARGE: f64 = 4.8032043e-10;

/// Boltzmann constant, erg/K.
pub const BOLTZMANN: f64 = 1.3806488e-16;

/// e² / (Bohr · k), K·Bohr. Coulomb energy of two unit charges at 1 Bohr measured in kelvin.
pub const SCALE_FACTOR: f64 = 315775.01611746440408;

/// Number of radial bins of the pair correlation histogram.
pub const CORR_LENGTH: usize = 90;

pub const STATE_FILE: &str = "config.dat";
pub const CORRELATION_FILE: &str = "correlation.dat";
pub const TRAJECTORY_FILE: &str = "all_configs.dat";
pub const GIBBS_BOX_LOG_FILE: &str = "2box.dat";

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_factor_matches_cgs_constants() {
        let scale = ELECTRON_CHARGE * ELECTRON_CHARGE / (BOHR * BOLTZMANN);
        assert_relative_eq!(scale, SCALE_FACTOR, max_relative = 1e-6);
    }
}
