//! Potential module - pairwise interaction models for electron-ion plasmas.
//!
//! Every model reports two quantities per pair: the *potential* used in the Metropolis
//! weight and the *energy* contribution used for averaged observables. All values are in
//! units of kT. Ions are positive unit charges, electrons negative unit charges.

mod ewald;
mod harrison;
mod lennard_jones;
mod pseudo;
mod shelf;

pub use ewald::Ewald;
pub use harrison::Harrison;
pub use lennard_jones::LennardJones;
pub use pseudo::PseudoPotential;
pub use shelf::Shelf;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::PeriodicBox;

/// Particle species. Ions carry charge +1, electrons -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Ion,
    Electron,
}

impl Species {
    #[inline]
    pub fn charge(self) -> f64 {
        match self {
            Species::Ion => 1.0,
            Species::Electron => -1.0,
        }
    }
}

/// Kind of an interacting pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    IonIon,
    ElectronElectron,
    IonElectron,
}

impl PairKind {
    #[inline]
    pub fn between(a: Species, b: Species) -> Self {
        match (a, b) {
            (Species::Ion, Species::Ion) => PairKind::IonIon,
            (Species::Electron, Species::Electron) => PairKind::ElectronElectron,
            _ => PairKind::IonElectron,
        }
    }

    #[inline]
    pub fn is_like_charge(self) -> bool {
        !matches!(self, PairKind::IonElectron)
    }
}

/// Borrowed view of the particles living in one periodic cell.
#[derive(Debug, Clone, Copy)]
pub struct BoxView<'a> {
    pub ions: &'a [Vector3<f64>],
    pub electrons: &'a [Vector3<f64>],
    pub cell: &'a PeriodicBox,
}

impl<'a> BoxView<'a> {
    pub fn new(ions: &'a [Vector3<f64>], electrons: &'a [Vector3<f64>], cell: &'a PeriodicBox) -> Self {
        Self { ions, electrons, cell }
    }

    pub fn len(&self) -> usize {
        self.ions.len() + self.electrons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All particles with their species, ions first.
    pub fn particles(&self) -> impl Iterator<Item = (Species, &'a Vector3<f64>)> + 'a {
        let ions = self.ions;
        let electrons = self.electrons;
        ions.iter()
            .map(|r| (Species::Ion, r))
            .chain(electrons.iter().map(|r| (Species::Electron, r)))
    }
}

/// Potential and energy sums of one particle against the rest of its cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairSums {
    pub potential: f64,
    pub energy: f64,
}

impl std::ops::Sub for PairSums {
    type Output = PairSums;

    fn sub(self, rhs: PairSums) -> PairSums {
        PairSums {
            potential: self.potential - rhs.potential,
            energy: self.energy - rhs.energy,
        }
    }
}

/// A pairwise interaction model.
pub trait PotentialModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Potential entering the Metropolis weight, kT.
    fn pair_potential(&self, r: f64, kind: PairKind) -> f64;

    /// Contribution of the pair to the system energy, kT.
    fn pair_energy(&self, r: f64, kind: PairKind) -> f64;

    /// Total energy of a cell. Defaults to the minimum-image pair sum.
    fn total_energy(&self, view: &BoxView<'_>) -> f64 {
        pair_sum(view, |r, kind| self.pair_energy(r, kind))
    }

    /// Total potential of a cell, minimum-image pair sum.
    fn total_potential(&self, view: &BoxView<'_>) -> f64 {
        pair_sum(view, |r, kind| self.pair_potential(r, kind))
    }

    /// Sums of a particle of `species` placed at `position` against every particle in the
    /// cell, skipping the slot `skip` (the particle's own current position).
    fn interaction(
        &self,
        view: &BoxView<'_>,
        species: Species,
        position: &Vector3<f64>,
        skip: Option<(Species, usize)>,
    ) -> PairSums {
        let mut sums = PairSums::default();
        for (other, block) in [(Species::Ion, view.ions), (Species::Electron, view.electrons)] {
            let kind = PairKind::between(species, other);
            for (j, r_j) in block.iter().enumerate() {
                if skip == Some((other, j)) {
                    continue;
                }
                let r = view.cell.distance(position, r_j);
                sums.potential += self.pair_potential(r, kind);
                sums.energy += self.pair_energy(r, kind);
            }
        }
        sums
    }
}

/// Minimum-image double loop over distinct pairs of a cell.
pub fn pair_sum<F>(view: &BoxView<'_>, f: F) -> f64
where
    F: Fn(f64, PairKind) -> f64,
{
    let particles: Vec<(Species, &Vector3<f64>)> = view.particles().collect();
    let mut total = 0.0;
    for (i, (s_i, r_i)) in particles.iter().enumerate() {
        for (s_j, r_j) in &particles[i + 1..] {
            total += f(view.cell.distance(r_i, r_j), PairKind::between(*s_i, *s_j));
        }
    }
    total
}

/// Coulomb energy of two unit charges at distance `r` Bohr, in kT.
#[inline]
pub(crate) fn coulomb(r: f64, temperature: f64) -> f64 {
    crate::constants::SCALE_FACTOR / (temperature * r)
}

/// Interaction model selector as it appears in run files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PotentialKind {
    Shelf {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
    Ewald {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default = "default_ewald_cutoff")]
        n_cutoff: i32,
        #[serde(default = "default_ewald_delta")]
        delta: f64,
    },
    Harrison {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default = "default_harrison_n")]
        n: i32,
    },
    Pseudo,
    LennardJones {
        #[serde(default = "default_lj_epsilon")]
        epsilon: f64,
        #[serde(default = "default_ro_star")]
        ro_star: f64,
    },
}

impl Default for PotentialKind {
    fn default() -> Self {
        PotentialKind::Shelf { epsilon: default_epsilon() }
    }
}

fn default_epsilon() -> f64 {
    4.0
}

fn default_ewald_cutoff() -> i32 {
    3
}

fn default_ewald_delta() -> f64 {
    1e-8
}

fn default_harrison_n() -> i32 {
    1
}

fn default_lj_epsilon() -> f64 {
    1.0
}

fn default_ro_star() -> f64 {
    0.1
}

/// Build the model for a state point.
///
/// # Arguments
/// * `kind` - model selector
/// * `temperature` - K
/// * `density` - per-species number density, cm⁻³
pub fn build_potential(kind: PotentialKind, temperature: f64, density: f64) -> Box<dyn PotentialModel> {
    match kind {
        PotentialKind::Shelf { epsilon } => Box::new(Shelf::new(temperature, epsilon)),
        PotentialKind::Ewald { epsilon, n_cutoff, delta } => {
            Box::new(Ewald::new(Shelf::new(temperature, epsilon), n_cutoff, delta))
        }
        PotentialKind::Harrison { epsilon, n } => Box::new(Harrison::new(Shelf::new(temperature, epsilon), n)),
        PotentialKind::Pseudo => Box::new(PseudoPotential::new(temperature)),
        PotentialKind::LennardJones { epsilon, ro_star } => {
            Box::new(LennardJones::from_density(epsilon, ro_star, density))
        }
    }
}
