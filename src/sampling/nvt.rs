//! Canonical (fixed N, V, T) ensemble in a single periodic cell.
//!
//! Every trial displaces one randomly chosen particle by up to the displacement scale along
//! each axis. The energy is tracked incrementally from pair sums and resynchronized from
//! scratch at rare checkpoints.

use color_eyre::eyre::Result;
use nalgebra::Vector3;
use tracing::{info, warn};

use super::averaging::EnergyWindow;
use super::correlation::CorrelationHistogram;
use super::traits::{Cadence, Ensemble, TrialMove};
use super::RandomSource;
use crate::geometry::PeriodicBox;
use crate::io::{CheckpointStore, Configuration, SingleBoxCheckpoint};
use crate::particles::SingleBoxParticles;
use crate::potential::{build_potential, PairSums, PotentialModel};

/// Pending displacement.
#[derive(Debug, Clone, Copy)]
struct Displacement {
    index: usize,
    position: Vector3<f64>,
    delta: PairSums,
}

pub struct NvtEnsemble {
    point: String,
    potential: Box<dyn PotentialModel>,
    particles: SingleBoxParticles,
    displacement_scale: f64,
    gamma: f64,
    resume: bool,
    start_from_lattice: bool,
    save_trajectory: bool,
    energy: f64,
    window: EnergyWindow,
    correlation: CorrelationHistogram,
    trial: Option<Displacement>,
}

impl NvtEnsemble {
    pub fn new(config: &Configuration) -> Self {
        let cell = PeriodicBox::new(config.box_width());
        Self {
            point: config.folder(),
            potential: build_potential(config.potential, config.temperature as f64, config.density),
            // replaced by initialize()
            particles: SingleBoxParticles::lattice(config.particles, cell),
            displacement_scale: config.displacement_scale(),
            gamma: config.gamma(),
            resume: config.resume,
            start_from_lattice: config.start_from_lattice,
            save_trajectory: config.save_trajectory,
            energy: 0.0,
            window: EnergyWindow::new(config.averaging_window()),
            correlation: CorrelationHistogram::new(cell.width(), config.particles),
            trial: None,
        }
    }

    pub fn particles(&self) -> &SingleBoxParticles {
        &self.particles
    }

    /// Energy of the current configuration as tracked by the chain, kT.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn average_energy(&self) -> f64 {
        self.window.mean()
    }

    fn fresh_start(&mut self, rng: &mut RandomSource) {
        let n = self.particles.len();
        let cell = *self.particles.cell();
        self.particles = if self.start_from_lattice {
            SingleBoxParticles::lattice(n, cell)
        } else {
            SingleBoxParticles::random(n, cell, rng)
        };
    }

    fn restore(&mut self, store: &CheckpointStore) -> Option<usize> {
        if !self.resume || !store.has_state() {
            return None;
        }
        match store.read_single(self.particles.len()) {
            Ok(checkpoint) => {
                self.particles = SingleBoxParticles::new(checkpoint.positions, *self.particles.cell());
                self.window.seed(checkpoint.average_energy);
                info!(point = %self.point, step = checkpoint.step, "state restored");
                Some(checkpoint.step)
            }
            Err(err) => {
                warn!(point = %self.point, "failed to read state, starting from scratch: {:#}", err);
                None
            }
        }
    }

    fn checkpoint(&mut self, step: usize) -> SingleBoxCheckpoint {
        let average = self.window.average();
        SingleBoxCheckpoint {
            step,
            average_energy: average,
            energy_per_particle: average / self.particles.len() as f64,
            gamma: self.gamma,
            positions: self.particles.positions().to_vec(),
        }
    }
}

impl Ensemble for NvtEnsemble {
    fn name(&self) -> &'static str {
        "nvt"
    }

    fn cadence(&self) -> Cadence {
        let n = self.particles.len();
        Cadence {
            frequent: n + 1,
            mid: 3 * n + 7,
            rare: 7 * n + 11,
        }
    }

    fn initialize(&mut self, store: &mut CheckpointStore, rng: &mut RandomSource) -> usize {
        let restored = self.restore(store);
        if restored.is_none() {
            self.fresh_start(rng);
        }
        self.resync_energy();
        if self.window.mean() == 0.0 {
            self.window.seed(self.energy);
        }

        if self.save_trajectory {
            if let Err(err) = store.open_trajectory(restored.is_some()) {
                warn!(point = %self.point, "trajectory disabled: {:#}", err);
            }
        }

        match restored {
            Some(step) => step,
            None => {
                info!(point = %self.point, potential = self.potential.name(), "fresh start");
                if let Err(err) = self.save(0, store) {
                    warn!(point = %self.point, "failed to write initial state: {:#}", err);
                }
                0
            }
        }
    }

    fn select_move(&mut self, _step: usize, _rng: &mut RandomSource) -> TrialMove {
        TrialMove::Displacement
    }

    fn propose(&mut self, trial: TrialMove, rng: &mut RandomSource) -> f64 {
        if trial != TrialMove::Displacement {
            panic!("{}: the single-box ensemble cannot perform {:?} trials", self.point, trial);
        }
        let index = rng.index(self.particles.len());
        let (species, slot) = self.particles.slot(index);
        let old = *self.particles.position(index);
        let position = self.particles.cell().fold(&(old + rng.displacement(self.displacement_scale)));

        let view = self.particles.view();
        let before = self.potential.interaction(&view, species, &old, Some((species, slot)));
        let after = self.potential.interaction(&view, species, &position, Some((species, slot)));
        let delta = after - before;

        self.trial = Some(Displacement { index, position, delta });
        (-delta.potential).exp()
    }

    fn accept(&mut self) {
        if let Some(trial) = self.trial.take() {
            self.particles.commit_move(trial.index, trial.position);
            self.energy += trial.delta.energy;
        }
    }

    fn reject(&mut self) {
        self.trial = None;
    }

    fn record_sample(&mut self) {
        self.window.push(self.energy);
    }

    fn resync_energy(&mut self) {
        self.energy = self.potential.total_energy(&self.particles.view());
    }

    fn on_frequent(&mut self, _step: usize, _store: &mut CheckpointStore) -> Result<()> {
        self.window.average();
        Ok(())
    }

    fn on_mid(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()> {
        self.correlation.sample(&self.particles.view());
        store.append_trajectory(step, self.particles.positions())
    }

    fn save(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()> {
        let checkpoint = self.checkpoint(step);
        store.write_single(&checkpoint)?;
        if let Some(rows) = self.correlation.rows() {
            store.write_correlation(&rows)?;
        }
        Ok(())
    }

    fn observables(&self) -> Vec<f64> {
        vec![self.window.mean() / self.particles.len() as f64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{EnsembleKind, GibbsParameters};
    use crate::potential::{PotentialKind, Shelf};
    use crate::sampling::metropolis_accept;
    use approx::assert_relative_eq;

    fn config(particles: usize) -> Configuration {
        Configuration {
            temperature: 10_000,
            density: 1e20,
            particles,
            steps: 2_000,
            max_delta: 1.0,
            potential: PotentialKind::Shelf { epsilon: 4.0 },
            ensemble: EnsembleKind::Nvt,
            equilibration_steps: 0,
            averaging_points: None,
            gibbs: GibbsParameters::default(),
            save_trajectory: false,
            start_from_lattice: false,
            resume: false,
            seed: Some(1),
        }
    }

    fn store(name: &str) -> CheckpointStore {
        let folder = std::env::temp_dir().join(format!("plasma_mc_nvt_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&folder);
        let store = CheckpointStore::new(folder);
        store.prepare().unwrap();
        store
    }

    #[test]
    fn test_cadence_periods() {
        let ensemble = NvtEnsemble::new(&config(10));
        assert_eq!(ensemble.cadence(), Cadence { frequent: 11, mid: 37, rare: 81 });
    }

    #[test]
    fn test_incremental_energy_tracks_full_sum() {
        let mut ensemble = NvtEnsemble::new(&config(20));
        let mut store = store("incremental");
        let mut rng = RandomSource::from_seed(33);
        assert_eq!(ensemble.initialize(&mut store, &mut rng), 0);

        for _ in 0..500 {
            let weight = ensemble.propose(TrialMove::Displacement, &mut rng);
            if metropolis_accept(weight, &mut rng) {
                ensemble.accept();
            } else {
                ensemble.reject();
            }
        }
        let tracked = ensemble.energy();
        ensemble.resync_energy();
        assert_relative_eq!(tracked, ensemble.energy(), epsilon = 1e-8, max_relative = 1e-10);
    }

    #[test]
    fn test_positions_stay_in_box() {
        let mut ensemble = NvtEnsemble::new(&config(16));
        let mut store = store("in_box");
        let mut rng = RandomSource::from_seed(5);
        ensemble.initialize(&mut store, &mut rng);
        for _ in 0..300 {
            ensemble.propose(TrialMove::Displacement, &mut rng);
            ensemble.accept();
        }
        let cell = *ensemble.particles().cell();
        assert!(ensemble.particles().positions().iter().all(|r| cell.contains(r)));
    }

    #[test]
    #[should_panic(expected = "cannot perform")]
    fn test_volume_change_is_rejected_by_single_box() {
        let mut ensemble = NvtEnsemble::new(&config(4));
        let mut rng = RandomSource::from_seed(5);
        ensemble.propose(TrialMove::VolumeChange, &mut rng);
    }

    #[test]
    fn test_shelf_pair_energy_vanishes_on_the_plateau() {
        let mut c = config(2);
        c.temperature = 100;
        c.density = 5e14;
        let shelf = Shelf::new(100.0, 4.0);
        let mut ensemble = NvtEnsemble::new(&c);
        let mut store = store("plateau");
        let mut rng = RandomSource::from_seed(21);
        ensemble.initialize(&mut store, &mut rng);

        let (mut inside, mut outside) = (0, 0);
        for _ in 0..10_000 {
            let weight = ensemble.propose(TrialMove::Displacement, &mut rng);
            if metropolis_accept(weight, &mut rng) {
                ensemble.accept();
            } else {
                ensemble.reject();
            }
            let particles = ensemble.particles();
            let r = particles.cell().distance(particles.position(0), particles.position(1));
            let potential = shelf.total_potential(&particles.view());
            if r < shelf.cutoff() {
                inside += 1;
                assert_relative_eq!(ensemble.energy(), 0.0, epsilon = 1e-9);
                assert_relative_eq!(potential, -4.0);
            } else {
                outside += 1;
                assert!(ensemble.energy() < 0.0 && ensemble.energy() >= -4.0);
                assert_relative_eq!(ensemble.energy(), potential, epsilon = 1e-9);
            }
        }
        assert!(inside > 0 && outside > 0, "inside {} outside {}", inside, outside);
    }

    #[test]
    fn test_resume_restores_the_interrupted_state() {
        let c = config(16);
        let mut store = store("resume_state");
        let mut rng = RandomSource::from_seed(44);
        let mut interrupted = NvtEnsemble::new(&c);
        interrupted.initialize(&mut store, &mut rng);
        for _ in 0..500 {
            let weight = interrupted.propose(TrialMove::Displacement, &mut rng);
            if metropolis_accept(weight, &mut rng) {
                interrupted.accept();
            } else {
                interrupted.reject();
            }
            interrupted.record_sample();
        }
        interrupted.resync_energy();
        interrupted.save(500, &mut store).unwrap();

        let mut resumed_config = c.clone();
        resumed_config.resume = true;
        let mut resumed = NvtEnsemble::new(&resumed_config);
        assert_eq!(resumed.initialize(&mut store, &mut RandomSource::from_seed(0)), 500);

        for (a, b) in interrupted.particles().positions().iter().zip(resumed.particles().positions()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-14);
        }
        assert_relative_eq!(resumed.energy(), interrupted.energy(), epsilon = 1e-9, max_relative = 1e-12);
        assert_relative_eq!(resumed.average_energy(), interrupted.average_energy(), max_relative = 1e-14);
    }
}
