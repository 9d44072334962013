//! Harrison spherical summation of the shelf interaction over periodic images.
//!
//! Images of every particle are summed inside a sphere of radius `R = L(1/2 + n)` around the
//! reference particle, with all images of the inner `n²` shell always included.

use nalgebra::Vector3;

use super::{BoxView, PairKind, PotentialModel, Shelf, Species};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harrison {
    shelf: Shelf,
    /// Image shell order
    pub n: i32,
}

impl Harrison {
    pub fn new(shelf: Shelf, n: i32) -> Self {
        Self { shelf, n }
    }
}

impl PotentialModel for Harrison {
    fn name(&self) -> &'static str {
        "harrison"
    }

    fn pair_potential(&self, r: f64, kind: PairKind) -> f64 {
        self.shelf.pair_potential(r, kind)
    }

    fn pair_energy(&self, r: f64, kind: PairKind) -> f64 {
        self.shelf.pair_energy(r, kind)
    }

    fn total_energy(&self, view: &BoxView<'_>) -> f64 {
        let l = view.cell.width();
        let n = self.n;
        let inner = (n * n) as f64;
        let shell = (2.0_f64.sqrt() + n as f64).powi(2);
        let r_cut = l * (0.5 + n as f64);
        let particles: Vec<(Species, &Vector3<f64>)> = view.particles().collect();
        let mut result = 0.0;

        for (i, (s_i, r_i)) in particles.iter().enumerate() {
            for nx in -n..=n {
                for ny in -n..=n {
                    for nz in -n..=n {
                        let n2 = (nx * nx + ny * ny + nz * nz) as f64;
                        if n2 >= shell {
                            continue;
                        }
                        let shift = Vector3::new(nx as f64, ny as f64, nz as f64) * l;
                        let home = nx == 0 && ny == 0 && nz == 0;

                        for (j, (s_j, r_j)) in particles.iter().enumerate() {
                            if home && i == j {
                                continue;
                            }
                            let range = (*r_j - *r_i + shift).norm();
                            if n2 < inner || range < r_cut {
                                result += self.shelf.pair_energy(range, PairKind::between(*s_i, *s_j));
                            }
                        }
                    }
                }
            }
        }
        0.5 * result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PeriodicBox;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_order_reduces_to_home_cell_sum() {
        let shelf = Shelf::new(10_000.0, 4.0);
        let harrison = Harrison::new(shelf, 0);
        let cell = PeriodicBox::new(100.0);
        let ions = [Vector3::new(10.0, 10.0, 10.0)];
        let electrons = [Vector3::new(30.0, 10.0, 10.0)];
        let view = BoxView::new(&ions, &electrons, &cell);
        // with n = 0 only the home cell within L/2 contributes
        assert_relative_eq!(
            harrison.total_energy(&view),
            shelf.pair_energy(20.0, PairKind::IonElectron),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_first_order_is_symmetric_in_particle_order() {
        let harrison = Harrison::new(Shelf::new(10_000.0, 4.0), 1);
        let cell = PeriodicBox::new(150.0);
        let ions = [Vector3::new(10.0, 20.0, 30.0), Vector3::new(100.0, 90.0, 10.0)];
        let electrons = [Vector3::new(70.0, 140.0, 5.0), Vector3::new(40.0, 60.0, 120.0)];
        let forward = harrison.total_energy(&BoxView::new(&ions, &electrons, &cell));
        let ions_rev = [ions[1], ions[0]];
        let electrons_rev = [electrons[1], electrons[0]];
        let backward = harrison.total_energy(&BoxView::new(&ions_rev, &electrons_rev, &cell));
        assert!(forward.is_finite());
        assert_relative_eq!(forward, backward, max_relative = 1e-12);
    }
}
