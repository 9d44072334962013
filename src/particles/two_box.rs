//! Neutral ion-electron pairs shared between two periodic cells (Gibbs ensemble).
//!
//! Pair `p` is the ion `ions[p]` together with the electron `electrons[p]`. Pairs
//! `[0, border)` live in box 0 and pairs `[border, N/2)` in box 1, so each box always holds
//! whole neutral pairs and the partition stays contiguous.

use nalgebra::Vector3;
use std::ops::Range;

use super::placement::{lattice_positions, random_positions};
use crate::geometry::PeriodicBox;
use crate::potential::{BoxView, Species};
use crate::sampling::RandomSource;

#[derive(Debug, Clone)]
pub struct TwoBoxParticles {
    ions: Vec<Vector3<f64>>,
    electrons: Vec<Vector3<f64>>,
    border: usize,
    cells: [PeriodicBox; 2],
}

impl TwoBoxParticles {
    /// Wrap existing coordinates. Each pair is folded into the cell that owns it.
    pub fn new(
        ions: Vec<Vector3<f64>>,
        electrons: Vec<Vector3<f64>>,
        border: usize,
        cells: [PeriodicBox; 2],
    ) -> Self {
        debug_assert_eq!(ions.len(), electrons.len(), "every ion needs its electron");
        debug_assert!(border <= ions.len());
        let owner = |pair: usize| if pair < border { &cells[0] } else { &cells[1] };
        let ions = ions.iter().enumerate().map(|(p, r)| owner(p).fold(r)).collect();
        let electrons = electrons.iter().enumerate().map(|(p, r)| owner(p).fold(r)).collect();
        Self { ions, electrons, border, cells }
    }

    /// `pairs` pairs split `border` / `pairs - border`, uniformly random inside their cells.
    pub fn random(pairs: usize, border: usize, cells: [PeriodicBox; 2], rng: &mut RandomSource) -> Self {
        let mut ions = random_positions(border, cells[0].width(), rng);
        let mut electrons = random_positions(border, cells[0].width(), rng);
        ions.extend(random_positions(pairs - border, cells[1].width(), rng));
        electrons.extend(random_positions(pairs - border, cells[1].width(), rng));
        Self::new(ions, electrons, border, cells)
    }

    /// Rock-salt-like start in both cells.
    pub fn lattice(pairs: usize, border: usize, cells: [PeriodicBox; 2]) -> Self {
        let (mut ions, mut electrons) = lattice_positions(2 * border, cells[0].width());
        let (ions1, electrons1) = lattice_positions(2 * (pairs - border), cells[1].width());
        ions.extend(ions1);
        electrons.extend(electrons1);
        Self::new(ions, electrons, border, cells)
    }

    /// Total number of pairs.
    pub fn pairs(&self) -> usize {
        self.ions.len()
    }

    pub fn border(&self) -> usize {
        self.border
    }

    pub fn cell(&self, which: usize) -> &PeriodicBox {
        &self.cells[which]
    }

    pub fn cells(&self) -> &[PeriodicBox; 2] {
        &self.cells
    }

    /// Pair indices owned by a box.
    pub fn range(&self, which: usize) -> Range<usize> {
        match which {
            0 => 0..self.border,
            _ => self.border..self.pairs(),
        }
    }

    pub fn pairs_in(&self, which: usize) -> usize {
        self.range(which).len()
    }

    /// Particles (not pairs) in a box.
    pub fn particles_in(&self, which: usize) -> usize {
        2 * self.pairs_in(which)
    }

    pub fn box_of(&self, pair: usize) -> usize {
        usize::from(pair >= self.border)
    }

    pub fn ions(&self) -> &[Vector3<f64>] {
        &self.ions
    }

    pub fn electrons(&self) -> &[Vector3<f64>] {
        &self.electrons
    }

    pub fn position(&self, species: Species, pair: usize) -> &Vector3<f64> {
        match species {
            Species::Ion => &self.ions[pair],
            Species::Electron => &self.electrons[pair],
        }
    }

    pub fn view(&self, which: usize) -> BoxView<'_> {
        let range = self.range(which);
        BoxView::new(&self.ions[range.clone()], &self.electrons[range], &self.cells[which])
    }

    pub fn commit_move(&mut self, species: Species, pair: usize, position: Vector3<f64>) {
        debug_assert!(self.cells[self.box_of(pair)].contains(&position));
        match species {
            Species::Ion => self.ions[pair] = position,
            Species::Electron => self.electrons[pair] = position,
        }
    }

    /// Coordinates of every pair scaled to new cell widths, folded into the new cells.
    /// Returns `(ions, electrons)` without touching the configuration.
    pub fn rescaled(&self, widths: [f64; 2]) -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
        let scale = |pair: usize, r: &Vector3<f64>| {
            let which = self.box_of(pair);
            PeriodicBox::new(widths[which]).fold(&(r * (widths[which] / self.cells[which].width())))
        };
        let ions = self.ions.iter().enumerate().map(|(p, r)| scale(p, r)).collect();
        let electrons = self.electrons.iter().enumerate().map(|(p, r)| scale(p, r)).collect();
        (ions, electrons)
    }

    pub fn commit_volume_change(
        &mut self,
        widths: [f64; 2],
        ions: Vec<Vector3<f64>>,
        electrons: Vec<Vector3<f64>>,
    ) {
        debug_assert_eq!(ions.len(), self.ions.len());
        debug_assert_eq!(electrons.len(), self.electrons.len());
        self.cells[0].set_width(widths[0]);
        self.cells[1].set_width(widths[1]);
        self.ions = ions;
        self.electrons = electrons;
    }

    /// Move pair `pair` into the other box at the given coordinates. Returns the pair's new
    /// index. The source box must keep at least one pair.
    pub fn commit_particle_transfer(&mut self, pair: usize, ion: Vector3<f64>, electron: Vector3<f64>) -> usize {
        let from = self.box_of(pair);
        debug_assert!(self.pairs_in(from) > 1, "transfer would empty box {}", from);

        let index = if from == 0 {
            // slide the pair to the end of box 0, then hand the slot over to box 1
            self.ions[pair..self.border].rotate_left(1);
            self.electrons[pair..self.border].rotate_left(1);
            self.border -= 1;
            self.border
        } else {
            self.ions[self.border..=pair].rotate_right(1);
            self.electrons[self.border..=pair].rotate_right(1);
            self.border += 1;
            self.border - 1
        };

        debug_assert!(self.cells[1 - from].contains(&ion) && self.cells[1 - from].contains(&electron));
        self.ions[index] = ion;
        self.electrons[index] = electron;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> TwoBoxParticles {
        let mut rng = RandomSource::from_seed(5);
        TwoBoxParticles::random(6, 3, [PeriodicBox::new(10.0), PeriodicBox::new(20.0)], &mut rng)
    }

    #[test]
    fn test_partition() {
        let particles = sample();
        assert_eq!(particles.range(0), 0..3);
        assert_eq!(particles.range(1), 3..6);
        assert_eq!(particles.particles_in(1), 6);
        assert_eq!(particles.box_of(2), 0);
        assert_eq!(particles.box_of(3), 1);
        assert!(particles.ions()[..3].iter().all(|r| particles.cell(0).contains(r)));
        assert!(particles.electrons()[3..].iter().all(|r| particles.cell(1).contains(r)));
    }

    #[test]
    fn test_transfer_keeps_pairs_and_partition() {
        let mut particles = sample();
        let moved_out = particles.ions()[4];
        let kept = particles.ions()[0];
        let ion = Vector3::new(1.0, 1.0, 1.0);
        let electron = Vector3::new(2.0, 2.0, 2.0);

        let index = particles.commit_particle_transfer(1, ion, electron);
        assert_eq!(index, 2);
        assert_eq!(particles.border(), 2);
        assert_eq!(particles.pairs(), 6);
        assert_eq!(particles.ions()[0], kept);
        assert_eq!(particles.ions()[index], ion);
        assert_eq!(particles.electrons()[index], electron);
        assert_eq!(particles.ions()[4], moved_out);

        let back = particles.commit_particle_transfer(5, Vector3::new(3.0, 3.0, 3.0), Vector3::new(4.0, 4.0, 4.0));
        assert_eq!(back, 2);
        assert_eq!(particles.border(), 3);
        assert_eq!(particles.box_of(back), 0);
        assert_eq!(particles.ions()[3], ion);
    }

    #[test]
    fn test_rescale_conserves_relative_coordinates() {
        let mut particles = sample();
        let before = particles.ions()[4] / particles.cell(1).width();
        let (ions, electrons) = particles.rescaled([12.0, 15.0]);
        particles.commit_volume_change([12.0, 15.0], ions, electrons);
        assert_relative_eq!(particles.cell(1).width(), 15.0);
        assert_relative_eq!(particles.ions()[4] / 15.0, before, epsilon = 1e-12);
        assert!(particles.electrons()[..3].iter().all(|r| particles.cell(0).contains(r)));
    }
}
