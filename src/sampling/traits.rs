//! Traits for Metropolis sampling.

use color_eyre::eyre::Result;

use super::RandomSource;
use crate::io::CheckpointStore;

/// Kinds of trial moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialMove {
    /// Displace one particle inside its box
    Displacement,
    /// Exchange volume between the two boxes
    VolumeChange,
    /// Move an ion-electron pair into the other box
    Interchange,
}

/// Step periods of the periodic bookkeeping actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    /// Averages and acceptance ratio
    pub frequent: usize,
    /// Correlation sampling and trajectory
    pub mid: usize,
    /// Energy resync and checkpoint
    pub rare: usize,
}

/// Metropolis weight test: accept iff `weight >= 1` or `weight > u`, `u` uniform in `[0, 1)`.
#[inline]
pub fn metropolis_accept(weight: f64, rng: &mut RandomSource) -> bool {
    weight >= 1.0 || weight > rng.uniform()
}

/// A statistical ensemble driven by [`crate::sampling::MetropolisEngine`].
///
/// One trial is a `propose` followed by exactly one of `accept` or `reject`.
pub trait Ensemble: Send {
    fn name(&self) -> &'static str;

    fn cadence(&self) -> Cadence;

    /// Restore particles from the checkpoint or place them afresh. Returns the number of
    /// steps already done.
    fn initialize(&mut self, store: &mut CheckpointStore, rng: &mut RandomSource) -> usize;

    fn select_move(&mut self, step: usize, rng: &mut RandomSource) -> TrialMove;

    /// Build a trial of the given kind and return its Metropolis weight.
    ///
    /// Panics if the ensemble does not support `trial`.
    fn propose(&mut self, trial: TrialMove, rng: &mut RandomSource) -> f64;

    fn accept(&mut self);

    fn reject(&mut self);

    /// Push the current energies into the averaging windows.
    fn record_sample(&mut self);

    /// Recompute the tracked energies from scratch.
    fn resync_energy(&mut self);

    fn on_frequent(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()>;

    fn on_mid(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()>;

    /// Write the checkpoint (and correlation data where collected).
    fn save(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()>;

    /// Current result tuple as reported to the controller.
    fn observables(&self) -> Vec<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metropolis_accept_bounds() {
        let mut rng = RandomSource::from_seed(1);
        for _ in 0..1000 {
            assert!(metropolis_accept(1.0, &mut rng));
            assert!(metropolis_accept(f64::INFINITY, &mut rng));
            assert!(!metropolis_accept(0.0, &mut rng));
        }
    }

    #[test]
    fn test_metropolis_accept_rate() {
        let mut rng = RandomSource::from_seed(2);
        let accepted = (0..20_000).filter(|_| metropolis_accept(0.25, &mut rng)).count();
        let rate = accepted as f64 / 20_000.0;
        assert!((rate - 0.25).abs() < 0.02, "rate {}", rate);
    }
}
