//! Cubic simulation cell with periodic boundaries.
//!
//! Coordinates of committed particles always live in `[0, L)` along every axis. Differences
//! of two such coordinates lie in `(-L, L)` and are folded to the nearest image with [`wrap`].

use nalgebra::Vector3;

/// Fold a coordinate difference to the nearest periodic image of a cell of edge `2 * half`.
///
/// Valid for `|delta| < 2 * half` (the difference of two folded coordinates); the result lies
/// in `(-half, half]`.
#[inline]
pub fn wrap(delta: f64, half: f64) -> f64 {
    if delta > half {
        delta - 2.0 * half
    } else if delta <= -half {
        delta + 2.0 * half
    } else {
        delta
    }
}

/// Map an arbitrary coordinate into `[0, width)` with a floored modulo.
#[inline]
pub fn fold_position(coord: f64, width: f64) -> f64 {
    let folded = coord.rem_euclid(width);
    // rem_euclid may round up to exactly `width` for tiny negative inputs
    if folded >= width {
        0.0
    } else {
        folded
    }
}

/// A cubic periodic cell of edge `width` (Bohr).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    width: f64,
}

impl PeriodicBox {
    pub fn new(width: f64) -> Self {
        debug_assert!(width > 0.0, "box width must be positive");
        Self { width }
    }

    /// Cell built from a volume in Bohr³.
    pub fn from_volume(volume: f64) -> Self {
        Self::new(volume.cbrt())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn half_width(&self) -> f64 {
        0.5 * self.width
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.width.powi(3)
    }

    pub fn set_width(&mut self, width: f64) {
        debug_assert!(width > 0.0, "box width must be positive");
        self.width = width;
    }

    /// Minimum-image separation vector `a - b`.
    #[inline]
    pub fn minimum_image(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
        let h = self.half_width();
        Vector3::new(wrap(a.x - b.x, h), wrap(a.y - b.y, h), wrap(a.z - b.z, h))
    }

    /// Minimum-image distance between two folded positions.
    #[inline]
    pub fn distance(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
        self.minimum_image(a, b).norm()
    }

    /// Fold a position into the cell.
    #[inline]
    pub fn fold(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let l = self.width;
        Vector3::new(fold_position(r.x, l), fold_position(r.y, l), fold_position(r.z, l))
    }

    pub fn contains(&self, r: &Vector3<f64>) -> bool {
        r.iter().all(|&c| (0.0..self.width).contains(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_range_and_idempotence() {
        let half = 5.0;
        let deltas = [-9.99, -5.0, -4.99, -0.3, 0.0, 2.5, 5.0, 5.01, 9.99];
        for &d in &deltas {
            let w = wrap(d, half);
            assert!(w > -5.0 && w <= 5.0, "wrap({}) = {} out of range", d, w);
            assert_relative_eq!(wrap(w, half), w);
        }
        assert_relative_eq!(wrap(-5.0, half), 5.0);
        assert_relative_eq!(wrap(5.0, half), 5.0);
        assert_relative_eq!(wrap(7.0, half), -3.0);
        assert_relative_eq!(wrap(-7.0, half), 3.0);
    }

    #[test]
    fn test_fold_position_range() {
        let width = 3.0;
        for &c in &[-7.5, -3.0, -1e-18, 0.0, 1.5, 2.999, 3.0, 8.25] {
            let f = fold_position(c, width);
            assert!((0.0..width).contains(&f), "fold({}) = {}", c, f);
        }
        assert_relative_eq!(fold_position(-0.5, width), 2.5);
        assert_relative_eq!(fold_position(4.0, width), 1.0);
        assert_eq!(fold_position(-1e-18, width), 0.0);
    }

    #[test]
    fn test_minimum_image_matches_nearest_image() {
        let cell = PeriodicBox::new(8.0);
        let a = Vector3::new(0.5, 7.5, 4.0);
        let b = Vector3::new(7.5, 0.5, 1.0);
        let d = cell.minimum_image(&a, &b);
        assert_relative_eq!(d, Vector3::new(1.0, -1.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(cell.distance(&a, &b), 11.0_f64.sqrt(), epsilon = 1e-12);
        assert!(d.iter().all(|c| c.abs() <= cell.half_width()));
    }

    #[test]
    fn test_volume_roundtrip() {
        let mut cell = PeriodicBox::from_volume(27.0);
        assert_relative_eq!(cell.width(), 3.0, epsilon = 1e-12);
        cell.set_width(2.0);
        assert_relative_eq!(cell.volume(), 8.0);
        assert!(cell.contains(&Vector3::new(0.0, 1.0, 1.999)));
        assert!(!cell.contains(&Vector3::new(2.0, 1.0, 1.0)));
    }
}
