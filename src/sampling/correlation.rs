//! Radial pair-correlation histogram g(r) for the ion-ion, electron-ion and
//! electron-electron channels.
//!
//! Raw counts are accumulated per sampling event; normalization to g(r) happens only when
//! rows are requested.

use std::f64::consts::PI;

use crate::constants::CORR_LENGTH;
use crate::potential::BoxView;

const ION_ION: usize = 0;
const ELECTRON_ION: usize = 1;
const ELECTRON_ELECTRON: usize = 2;

#[derive(Debug, Clone)]
pub struct CorrelationHistogram {
    counts: [Vec<u64>; 3],
    samples: u64,
    dr: f64,
    norm: f64,
}

impl CorrelationHistogram {
    /// Histogram for `n_particles` particles in a cell of edge `width`. The bins cover the
    /// half body diagonal, the largest minimum-image separation.
    pub fn new(width: f64, n_particles: usize) -> Self {
        let n = n_particles.max(1) as f64;
        Self {
            counts: [vec![0; CORR_LENGTH], vec![0; CORR_LENGTH], vec![0; CORR_LENGTH]],
            samples: 0,
            dr: (3.0 * width * width).sqrt() / 1.99999999999 / CORR_LENGTH as f64,
            norm: 4.0 * width.powi(3) / (n * n),
        }
    }

    pub fn bin_width(&self) -> f64 {
        self.dr
    }

    /// Number of sampling events so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn counts(&self, channel: usize) -> &[u64] {
        &self.counts[channel]
    }

    /// Add every pair separation of the cell to the histogram.
    pub fn sample(&mut self, view: &BoxView<'_>) {
        for (i, a) in view.ions.iter().enumerate() {
            for b in &view.ions[i + 1..] {
                self.add(ION_ION, view.cell.distance(a, b), 2);
            }
        }
        for (i, a) in view.electrons.iter().enumerate() {
            for b in &view.electrons[i + 1..] {
                self.add(ELECTRON_ELECTRON, view.cell.distance(a, b), 2);
            }
            for b in view.ions {
                self.add(ELECTRON_ION, view.cell.distance(a, b), 1);
            }
        }
        self.samples += 1;
    }

    // like-species pairs are counted in both orders
    fn add(&mut self, channel: usize, r: f64, weight: u64) {
        let bin = (r / self.dr) as usize;
        if bin < CORR_LENGTH {
            self.counts[channel][bin] += weight;
        }
    }

    /// Normalized rows `(r, g_ii, g_ei, g_ee)` at the bin centers, `None` before the first
    /// sampling event.
    pub fn rows(&self) -> Option<Vec<[f64; 4]>> {
        if self.samples == 0 {
            return None;
        }
        let rows = (0..CORR_LENGTH)
            .map(|bin| {
                let r = (bin as f64 + 0.5) * self.dr;
                let norm = self.norm / (4.0 * PI * r * r * self.dr * self.samples as f64);
                [
                    r,
                    self.counts[ION_ION][bin] as f64 * norm,
                    self.counts[ELECTRON_ION][bin] as f64 * norm,
                    self.counts[ELECTRON_ELECTRON][bin] as f64 * norm,
                ]
            })
            .collect();
        Some(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PeriodicBox;
    use crate::sampling::RandomSource;
    use crate::particles::random_positions;

    #[test]
    fn test_no_rows_before_sampling() {
        let histogram = CorrelationHistogram::new(10.0, 4);
        assert!(histogram.rows().is_none());
        assert_eq!(histogram.samples(), 0);
    }

    #[test]
    fn test_counts_every_pair_once_per_channel() {
        let cell = PeriodicBox::new(10.0);
        let mut rng = RandomSource::from_seed(9);
        let ions = random_positions(3, 10.0, &mut rng);
        let electrons = random_positions(3, 10.0, &mut rng);
        let mut histogram = CorrelationHistogram::new(10.0, 6);
        histogram.sample(&BoxView::new(&ions, &electrons, &cell));

        assert_eq!(histogram.counts(ION_ION).iter().sum::<u64>(), 6);
        assert_eq!(histogram.counts(ELECTRON_ELECTRON).iter().sum::<u64>(), 6);
        assert_eq!(histogram.counts(ELECTRON_ION).iter().sum::<u64>(), 9);
        assert_eq!(histogram.samples(), 1);
    }

    #[test]
    fn test_uniform_gas_is_roughly_flat() {
        let width = 20.0;
        let cell = PeriodicBox::new(width);
        let mut rng = RandomSource::from_seed(2024);
        let mut histogram = CorrelationHistogram::new(width, 200);
        for _ in 0..50 {
            let ions = random_positions(100, width, &mut rng);
            let electrons = random_positions(100, width, &mut rng);
            histogram.sample(&BoxView::new(&ions, &electrons, &cell));
        }
        let rows = histogram.rows().unwrap();
        // well inside half the box the ideal-gas g(r) is close to one
        let mid: Vec<_> = rows.iter().filter(|row| row[0] > 4.0 && row[0] < 9.0).collect();
        let mean_ei = mid.iter().map(|row| row[2]).sum::<f64>() / mid.len() as f64;
        assert!((mean_ei - 1.0).abs() < 0.1, "g_ei = {}", mean_ei);
    }
}
