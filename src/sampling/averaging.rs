//! Running averages of a Metropolis chain.

use std::collections::VecDeque;

/// Bounded FIFO of the most recent energy samples.
///
/// Once full, every new sample evicts the oldest one. The mean is recomputed on demand from
/// the retained samples only.
#[derive(Debug, Clone)]
pub struct EnergyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    mean: f64,
}

impl EnergyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(1 << 20)),
            capacity,
            mean: 0.0,
        }
    }

    pub fn push(&mut self, energy: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(energy);
    }

    /// Recompute and return the mean of the retained samples (0 when empty).
    pub fn average(&mut self) -> f64 {
        if !self.samples.is_empty() {
            self.mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        }
        self.mean
    }

    /// Mean from the last call to [`EnergyWindow::average`] or [`EnergyWindow::seed`].
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Set the mean reported before any sample has been averaged, e.g. a restored value.
    pub fn seed(&mut self, mean: f64) {
        self.mean = mean;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Accepted/attempted trial counter reset at every frequent cadence.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceTracker {
    accepted: u64,
    attempted: u64,
    ratio: f64,
}

impl AcceptanceTracker {
    pub fn record(&mut self, accepted: bool) {
        self.attempted += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Close the current period: store its acceptance ratio and start counting afresh.
    pub fn roll(&mut self) -> f64 {
        if self.attempted > 0 {
            self.ratio = self.accepted as f64 / self.attempted as f64;
        }
        self.accepted = 0;
        self.attempted = 0;
        self.ratio
    }

    /// Ratio of the last closed period.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

/// Per-box number densities accumulated every step and averaged per period.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityAverager {
    sums: [f64; 2],
    samples: u64,
    averages: [f64; 2],
}

impl DensityAverager {
    pub fn record(&mut self, densities: [f64; 2]) {
        self.sums[0] += densities[0];
        self.sums[1] += densities[1];
        self.samples += 1;
    }

    pub fn roll(&mut self) -> [f64; 2] {
        if self.samples > 0 {
            let n = self.samples as f64;
            self.averages = [self.sums[0] / n, self.sums[1] / n];
        }
        self.sums = [0.0; 2];
        self.samples = 0;
        self.averages
    }

    pub fn averages(&self) -> [f64; 2] {
        self.averages
    }

    /// Initial averages, used before the first period closes.
    pub fn seed(&mut self, averages: [f64; 2]) {
        self.averages = averages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = EnergyWindow::new(4);
        for i in 0..10 {
            window.push(i as f64);
            assert!(window.len() <= 4);
        }
        assert_eq!(window.len(), 4);
        // 6, 7, 8, 9 remain
        assert_relative_eq!(window.average(), 7.5);
    }

    #[test]
    fn test_window_mean_before_samples() {
        let mut window = EnergyWindow::new(3);
        assert_eq!(window.average(), 0.0);
        window.seed(-2.5);
        assert_relative_eq!(window.average(), -2.5);
        window.push(1.0);
        assert_relative_eq!(window.average(), 1.0);
    }

    #[test]
    fn test_acceptance_tracker_rolls() {
        let mut tracker = AcceptanceTracker::default();
        for i in 0..10 {
            tracker.record(i % 4 == 0);
        }
        assert_relative_eq!(tracker.roll(), 0.3);
        // empty period keeps the previous ratio
        assert_relative_eq!(tracker.roll(), 0.3);
        tracker.record(true);
        assert_relative_eq!(tracker.roll(), 1.0);
    }

    #[test]
    fn test_density_averager() {
        let mut densities = DensityAverager::default();
        densities.record([1.0, 3.0]);
        densities.record([3.0, 5.0]);
        assert_eq!(densities.roll(), [2.0, 4.0]);
        assert_eq!(densities.averages(), [2.0, 4.0]);
    }
}
