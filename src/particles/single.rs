//! Neutral particle set in one periodic cell.

use nalgebra::Vector3;

use super::placement::{lattice_positions, random_positions};
use crate::geometry::PeriodicBox;
use crate::potential::{BoxView, Species};
use crate::sampling::RandomSource;

/// Ions occupy indices `[0, N/2)`, electrons `[N/2, N)`.
#[derive(Debug, Clone)]
pub struct SingleBoxParticles {
    positions: Vec<Vector3<f64>>,
    n_ions: usize,
    cell: PeriodicBox,
}

impl SingleBoxParticles {
    /// Wrap existing coordinates (ions first). Coordinates are folded into the cell.
    pub fn new(positions: Vec<Vector3<f64>>, cell: PeriodicBox) -> Self {
        let n_ions = positions.len() / 2;
        let positions = positions.iter().map(|r| cell.fold(r)).collect();
        Self { positions, n_ions, cell }
    }

    pub fn random(n: usize, cell: PeriodicBox, rng: &mut RandomSource) -> Self {
        Self::new(random_positions(n, cell.width(), rng), cell)
    }

    pub fn lattice(n: usize, cell: PeriodicBox) -> Self {
        let (mut ions, electrons) = lattice_positions(n, cell.width());
        ions.extend(electrons);
        Self::new(ions, cell)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn n_ions(&self) -> usize {
        self.n_ions
    }

    pub fn cell(&self) -> &PeriodicBox {
        &self.cell
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> &Vector3<f64> {
        &self.positions[index]
    }

    pub fn species(&self, index: usize) -> Species {
        if index < self.n_ions {
            Species::Ion
        } else {
            Species::Electron
        }
    }

    /// Species and index within the species block.
    pub fn slot(&self, index: usize) -> (Species, usize) {
        match self.species(index) {
            Species::Ion => (Species::Ion, index),
            Species::Electron => (Species::Electron, index - self.n_ions),
        }
    }

    pub fn view(&self) -> BoxView<'_> {
        let (ions, electrons) = self.positions.split_at(self.n_ions);
        BoxView::new(ions, electrons, &self.cell)
    }

    pub fn commit_move(&mut self, index: usize, position: Vector3<f64>) {
        debug_assert!(self.cell.contains(&position), "committed position outside the cell");
        self.positions[index] = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_ions_first() {
        let mut rng = RandomSource::from_seed(1);
        let particles = SingleBoxParticles::random(10, PeriodicBox::new(50.0), &mut rng);
        assert_eq!(particles.len(), 10);
        assert_eq!(particles.n_ions(), 5);
        assert_eq!(particles.species(4), Species::Ion);
        assert_eq!(particles.species(5), Species::Electron);
        assert_eq!(particles.slot(7), (Species::Electron, 2));
        let view = particles.view();
        assert_eq!(view.ions.len(), 5);
        assert_eq!(view.electrons.len(), 5);
    }

    #[test]
    fn test_new_folds_coordinates() {
        let cell = PeriodicBox::new(10.0);
        let particles = SingleBoxParticles::new(
            vec![Vector3::new(-1.0, 12.0, 5.0), Vector3::new(3.0, 3.0, 3.0)],
            cell,
        );
        assert_eq!(*particles.position(0), Vector3::new(9.0, 2.0, 5.0));
    }

    #[test]
    fn test_commit_move() {
        let cell = PeriodicBox::new(10.0);
        let mut particles = SingleBoxParticles::lattice(8, cell);
        particles.commit_move(3, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(*particles.position(3), Vector3::new(1.0, 2.0, 3.0));
    }
}
