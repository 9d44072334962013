//! Ewald summation of the shelf interaction over the periodic lattice of images.
//!
//! Pair terms (used per step) are the plain shelf terms; the full-system energy is split into
//! the usual four parts:
//!
//! E = U_real + U_recip - U_self + U_bc
//!
//! with the splitting parameter α chosen from the image cutoff `n_cut` and the accuracy
//! target δ as α = π n_cut / (L √(-ln δ)).

use nalgebra::Vector3;
use num_complex::Complex64;
use statrs::function::erf::erfc;
use std::f64::consts::PI;

use super::{BoxView, PairKind, PotentialModel, Shelf, Species};
use crate::constants::SCALE_FACTOR;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ewald {
    shelf: Shelf,
    /// Image cutoff in both real and reciprocal space
    pub n_cutoff: i32,
    /// Accuracy target δ
    pub delta: f64,
}

/// Parameters derived for one box width.
#[derive(Debug, Clone, Copy)]
struct EwaldSplit {
    width: f64,
    alpha: f64,
    r_cut: f64,
}

impl Ewald {
    pub fn new(shelf: Shelf, n_cutoff: i32, delta: f64) -> Self {
        Self { shelf, n_cutoff, delta }
    }

    fn split(&self, width: f64) -> EwaldSplit {
        let alpha = PI * self.n_cutoff as f64 / (width * (-self.delta.ln()).sqrt());
        let r_cut = PI * self.n_cutoff as f64 / (alpha * alpha * width);
        EwaldSplit { width, alpha, r_cut }
    }

    /// Splitting parameter α for a box of edge `width`, 1/Bohr.
    pub fn alpha(&self, width: f64) -> f64 {
        self.split(width).alpha
    }

    /// Integer reciprocal vectors `n` with `0 < |n|² < n_cut²` and their weights
    /// `exp(-π²|n|²/(αL)²) / |n|²`.
    fn reciprocal_vectors(&self, split: &EwaldSplit) -> Vec<(Vector3<f64>, f64)> {
        let n_max = self.n_cutoff;
        let alpha_l2 = (split.alpha * split.width).powi(2);
        let mut vectors = Vec::new();

        for nx in -n_max..=n_max {
            for ny in -n_max..=n_max {
                for nz in -n_max..=n_max {
                    let n2 = nx * nx + ny * ny + nz * nz;
                    if n2 == 0 || n2 >= n_max * n_max {
                        continue;
                    }
                    let n2 = n2 as f64;
                    let weight = (-PI * PI * n2 / alpha_l2).exp() / n2;
                    vectors.push((Vector3::new(nx as f64, ny as f64, nz as f64), weight));
                }
            }
        }
        vectors
    }

    fn real_space(&self, view: &BoxView<'_>, split: &EwaldSplit) -> f64 {
        let particles: Vec<(Species, &Vector3<f64>)> = view.particles().collect();
        let n_max = self.n_cutoff;
        let l = split.width;
        let mut result = 0.0;

        for nx in -n_max..=n_max {
            for ny in -n_max..=n_max {
                for nz in -n_max..=n_max {
                    let shift = Vector3::new(nx as f64, ny as f64, nz as f64) * l;
                    let home = nx == 0 && ny == 0 && nz == 0;

                    for (i, (s_i, r_i)) in particles.iter().enumerate() {
                        for (j, (s_j, r_j)) in particles.iter().enumerate() {
                            if home && i == j {
                                continue;
                            }
                            let range = (view.cell.minimum_image(r_j, r_i) + shift).norm();
                            if range < split.r_cut {
                                let kind = PairKind::between(*s_i, *s_j);
                                result += self.shelf.pair_energy(range, kind) * erfc(split.alpha * range);
                            }
                        }
                    }
                }
            }
        }
        0.5 * result
    }

    fn reciprocal_space(&self, view: &BoxView<'_>, split: &EwaldSplit) -> f64 {
        let l = split.width;
        let mut result = 0.0;

        for (n, weight) in self.reciprocal_vectors(split) {
            let mut structure = Complex64::new(0.0, 0.0);
            for (species, r) in view.particles() {
                let phase = 2.0 * PI * n.dot(r) / l;
                structure += Complex64::new(phase.cos(), phase.sin()) * species.charge();
            }
            result += weight * structure.norm_sqr();
        }
        SCALE_FACTOR * result / (2.0 * PI * l * self.shelf.temperature)
    }

    fn self_energy(&self, n_particles: usize, split: &EwaldSplit) -> f64 {
        SCALE_FACTOR * n_particles as f64 * split.alpha / (PI.sqrt() * self.shelf.temperature)
    }

    /// Surface (dipole) term for vacuum boundary conditions.
    fn boundary(&self, view: &BoxView<'_>, split: &EwaldSplit) -> f64 {
        let dipole: Vector3<f64> = view
            .particles()
            .fold(Vector3::zeros(), |acc, (species, r)| acc + r * species.charge());
        SCALE_FACTOR * 2.0 * PI / (3.0 * split.width.powi(3)) * dipole.norm_squared() / self.shelf.temperature
    }
}

impl PotentialModel for Ewald {
    fn name(&self) -> &'static str {
        "ewald"
    }

    fn pair_potential(&self, r: f64, kind: PairKind) -> f64 {
        self.shelf.pair_potential(r, kind)
    }

    fn pair_energy(&self, r: f64, kind: PairKind) -> f64 {
        self.shelf.pair_energy(r, kind)
    }

    fn total_energy(&self, view: &BoxView<'_>) -> f64 {
        let split = self.split(view.cell.width());
        self.real_space(view, &split) + self.reciprocal_space(view, &split) - self.self_energy(view.len(), &split)
            + self.boundary(view, &split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PeriodicBox;
    use approx::assert_relative_eq;

    fn ewald() -> Ewald {
        Ewald::new(Shelf::new(10_000.0, 4.0), 3, 1e-8)
    }

    #[test]
    fn test_alpha_and_cutoff() {
        let e = ewald();
        let split = e.split(100.0);
        let expected_alpha = PI * 3.0 / (100.0 * (-(1e-8_f64).ln()).sqrt());
        assert_relative_eq!(split.alpha, expected_alpha, epsilon = 1e-14);
        assert_relative_eq!(split.r_cut, PI * 3.0 / (expected_alpha * expected_alpha * 100.0), epsilon = 1e-10);
        assert_relative_eq!(e.alpha(100.0), expected_alpha);
    }

    #[test]
    fn test_reciprocal_shell_excludes_origin_and_cutoff() {
        let e = ewald();
        let split = e.split(50.0);
        let vectors = e.reciprocal_vectors(&split);
        assert!(!vectors.is_empty());
        for (n, weight) in &vectors {
            let n2 = n.norm_squared();
            assert!(n2 > 0.0 && n2 < 9.0);
            assert!(*weight > 0.0);
        }
        // inversion symmetry of the shell
        assert_eq!(vectors.len() % 2, 0);
    }

    #[test]
    fn test_neutral_pair_energy_is_translation_invariant() {
        let e = ewald();
        let cell = PeriodicBox::new(400.0);
        let ions = [Vector3::new(100.0, 100.0, 100.0)];
        let electrons = [Vector3::new(250.0, 120.0, 90.0)];
        let base = e.total_energy(&BoxView::new(&ions, &electrons, &cell));
        assert!(base.is_finite());

        let shift = Vector3::new(10.0, 10.0, 10.0);
        let ions2 = [ions[0] + shift];
        let electrons2 = [electrons[0] + shift];
        let moved = e.total_energy(&BoxView::new(&ions2, &electrons2, &cell));
        assert_relative_eq!(base, moved, max_relative = 1e-9);
    }
}
