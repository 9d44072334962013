//! Fresh particle placements.

use nalgebra::Vector3;

use crate::sampling::RandomSource;

/// `n` uniformly random points of the cube `[0, width)³`.
pub fn random_positions(n: usize, width: f64, rng: &mut RandomSource) -> Vec<Vector3<f64>> {
    (0..n).map(|_| rng.point_in_box(width)).collect()
}

/// Rock-salt-like start: `n` sites of a simple cubic grid filled alternately with ions and
/// electrons. Returns `(ions, electrons)`, each of length `n / 2`.
///
/// The grid has `ceil(cbrt(n))` sites per edge and spacing `width / sites`, so every site
/// lies inside the cell.
pub fn lattice_positions(n: usize, width: f64) -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
    let mut per_edge = ((n as f64).cbrt().round() as usize).max(1);
    while per_edge.pow(3) < n {
        per_edge += 1;
    }
    let spacing = width / per_edge as f64;
    let mut ions = Vec::with_capacity(n / 2);
    let mut electrons = Vec::with_capacity(n / 2);

    for site in 0..(n / 2) * 2 {
        let x = site / (per_edge * per_edge);
        let y = (site % (per_edge * per_edge)) / per_edge;
        let z = site % per_edge;
        let r = Vector3::new(x as f64, y as f64, z as f64) * spacing;
        if site % 2 == 0 {
            ions.push(r);
        } else {
            electrons.push(r);
        }
    }
    (ions, electrons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_is_inside_and_distinct() {
        let (ions, electrons) = lattice_positions(64, 20.0);
        assert_eq!(ions.len(), 32);
        assert_eq!(electrons.len(), 32);
        let all: Vec<_> = ions.iter().chain(electrons.iter()).collect();
        for r in &all {
            assert!(r.iter().all(|c| (0.0..20.0).contains(c)));
        }
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!((*a - *b).norm() > 1e-9);
            }
        }
    }

    #[test]
    fn test_lattice_neighbours_alternate_species() {
        let (ions, electrons) = lattice_positions(8, 2.0);
        assert_eq!(ions[0], Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(electrons[0], Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_random_positions_in_box() {
        let mut rng = RandomSource::from_seed(11);
        let positions = random_positions(100, 5.0, &mut rng);
        assert_eq!(positions.len(), 100);
        assert!(positions.iter().all(|r| r.iter().all(|c| (0.0..5.0).contains(c))));
    }
}
