//! Metropolis engine: drives one ensemble through its step budget.
//!
//! States: `Uninitialized -> Running -> Finished`. Stop requests are observed once per
//! iteration; the final checkpoint is written on the way to `Finished`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use super::averaging::AcceptanceTracker;
use super::gibbs::GibbsEnsemble;
use super::nvt::NvtEnsemble;
use super::traits::{metropolis_accept, Ensemble};
use super::RandomSource;
use crate::io::{CheckpointStore, Configuration, EnsembleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Running,
    Finished,
}

/// Snapshot of an engine's progress and current results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub step: usize,
    pub budget: usize,
    /// NVT: `[E/N]`; Gibbs: `[Γ0, E0/N0, Γ1, E1/N1]`
    pub values: Vec<f64>,
    pub acceptance: f64,
    pub finished: bool,
    /// Finished without running (bad folder) or aborted by a panic
    pub failed: bool,
}

/// Shared handle between an engine and its observers.
#[derive(Debug)]
pub struct EngineMonitor {
    point: String,
    tag: String,
    budget: usize,
    stop: AtomicBool,
    finished: AtomicBool,
    step: AtomicUsize,
    result: Mutex<SimulationResult>,
}

impl EngineMonitor {
    fn new(config: &Configuration) -> Self {
        Self {
            point: config.folder(),
            tag: config.tag(),
            budget: config.steps,
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            step: AtomicUsize::new(0),
            result: Mutex::new(SimulationResult {
                budget: config.steps,
                ..Default::default()
            }),
        }
    }

    /// Folder identity of the point.
    pub fn point(&self) -> &str {
        &self.point
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Ask the engine to stop at the next iteration. No effect once finished.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn step(&self) -> usize {
        self.step.load(Ordering::Relaxed)
    }

    /// Latest published result.
    pub fn snapshot(&self) -> SimulationResult {
        let mut result = self.result.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone();
        result.step = result.step.max(self.step());
        result.finished = self.is_finished();
        result
    }

    fn publish(&self, result: SimulationResult) {
        *self.result.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = result;
    }

    /// Mark the engine as finished, recording a failure if `failed`.
    pub fn mark_finished(&self, failed: bool) {
        if failed {
            let mut result = self.result.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            result.failed = true;
        }
        self.finished.store(true, Ordering::Release);
    }
}

pub struct MetropolisEngine {
    ensemble: Box<dyn Ensemble>,
    rng: RandomSource,
    store: CheckpointStore,
    monitor: Arc<EngineMonitor>,
    temperature: u32,
    results_file: String,
    state: EngineState,
    budget: usize,
    equilibration: usize,
    step: usize,
    steps_this_run: usize,
    acceptance: AcceptanceTracker,
}

impl MetropolisEngine {
    /// Engine for `config`, writing into `output_root/<folder identity>`.
    pub fn new(config: &Configuration, output_root: &Path) -> Self {
        let ensemble: Box<dyn Ensemble> = match config.ensemble {
            EnsembleKind::Nvt => Box::new(NvtEnsemble::new(config)),
            EnsembleKind::Gibbs => Box::new(GibbsEnsemble::new(config)),
        };
        Self::with_ensemble(config, output_root, ensemble)
    }

    pub fn with_ensemble(config: &Configuration, output_root: &Path, ensemble: Box<dyn Ensemble>) -> Self {
        let rng = config.seed.map_or_else(RandomSource::from_entropy, RandomSource::from_seed);
        Self {
            ensemble,
            rng,
            store: CheckpointStore::new(output_root.join(config.folder())),
            monitor: Arc::new(EngineMonitor::new(config)),
            temperature: config.temperature,
            results_file: config.results_file_name(),
            state: EngineState::Uninitialized,
            budget: config.steps,
            equilibration: config.effective_equilibration(),
            step: 0,
            steps_this_run: 0,
            acceptance: AcceptanceTracker::default(),
        }
    }

    pub fn monitor(&self) -> Arc<EngineMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Temperature and aggregate results file this point reports into.
    pub fn results_target(&self) -> (u32, &str) {
        (self.temperature, &self.results_file)
    }

    pub fn folder(&self) -> &Path {
        self.store.folder()
    }

    /// Ask the engine to stop; a no-op once it has finished.
    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Prepare the point folder and particles. An uncreatable folder finishes the engine
    /// without running.
    pub fn initialize(&mut self) {
        if self.state != EngineState::Uninitialized {
            return;
        }
        if let Err(err) = self.store.prepare() {
            error!(point = %self.monitor.point(), "{:#}; worker is dead", err);
            self.state = EngineState::Finished;
            self.monitor.mark_finished(true);
            return;
        }

        self.step = self.ensemble.initialize(&mut self.store, &mut self.rng);
        self.monitor.step.store(self.step, Ordering::Relaxed);
        self.state = EngineState::Running;
        self.publish();
        info!(
            point = %self.monitor.point(),
            ensemble = self.ensemble.name(),
            step = self.step,
            budget = self.budget,
            "engine initialized"
        );
    }

    /// Run until the budget is exhausted or a stop is requested.
    pub fn run(&mut self) {
        self.initialize();
        if self.state != EngineState::Running {
            return;
        }

        let cadence = self.ensemble.cadence();
        while self.step < self.budget {
            if self.monitor.stop_requested() {
                info!(point = %self.monitor.point(), step = self.step, "stop requested");
                break;
            }

            let sampling = self.step >= self.equilibration;
            let trial = self.ensemble.select_move(self.step, &mut self.rng);
            let weight = self.ensemble.propose(trial, &mut self.rng);
            let accepted = metropolis_accept(weight, &mut self.rng);
            if accepted {
                self.ensemble.accept();
            } else {
                self.ensemble.reject();
            }

            self.step += 1;
            self.steps_this_run += 1;
            self.monitor.step.store(self.step, Ordering::Relaxed);

            if !sampling {
                if self.step == self.equilibration {
                    self.ensemble.resync_energy();
                    info!(point = %self.monitor.point(), step = self.step, "equilibration finished");
                }
                continue;
            }

            self.ensemble.record_sample();
            self.acceptance.record(accepted);

            if self.step % cadence.frequent == 0 {
                self.acceptance.roll();
                let outcome = self.ensemble.on_frequent(self.step, &mut self.store);
                self.log_failure("frequent", outcome);
                self.publish();
            }
            if self.step % cadence.mid == 0 {
                let outcome = self.ensemble.on_mid(self.step, &mut self.store);
                self.log_failure("mid", outcome);
            }
            if self.step % cadence.rare == 0 {
                self.ensemble.resync_energy();
                let outcome = self.ensemble.save(self.step, &mut self.store);
                self.log_failure("checkpoint", outcome);
            }
        }

        self.finish();
    }

    fn finish(&mut self) {
        if self.steps_this_run > 0 {
            let outcome = self.ensemble.save(self.step, &mut self.store);
            self.log_failure("final checkpoint", outcome);
        }
        let outcome = self.store.close_logs();
        self.log_failure("closing logs", outcome);
        self.acceptance.roll();
        self.publish();
        self.state = EngineState::Finished;
        self.monitor.mark_finished(false);
        info!(point = %self.monitor.point(), step = self.step, "engine finished");
    }

    fn publish(&self) {
        self.monitor.publish(SimulationResult {
            step: self.step,
            budget: self.budget,
            values: self.ensemble.observables(),
            acceptance: self.acceptance.ratio(),
            finished: self.state == EngineState::Finished,
            failed: false,
        });
    }

    fn log_failure(&self, action: &str, outcome: color_eyre::eyre::Result<()>) {
        if let Err(err) = outcome {
            warn!(point = %self.monitor.point(), step = self.step, "{} failed: {:#}", action, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GibbsParameters;
    use crate::potential::PotentialKind;

    fn fresh_root(root_name: &str) -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!("plasma_mc_engine_{}_{}", root_name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        root
    }

    fn config(root_name: &str) -> (Configuration, std::path::PathBuf) {
        let root = fresh_root(root_name);
        let config = Configuration {
            temperature: 10_000,
            density: 1e20,
            particles: 8,
            steps: 500,
            max_delta: 1.0,
            potential: PotentialKind::Shelf { epsilon: 4.0 },
            ensemble: EnsembleKind::Nvt,
            equilibration_steps: 0,
            averaging_points: None,
            gibbs: GibbsParameters::default(),
            save_trajectory: false,
            start_from_lattice: false,
            resume: false,
            seed: Some(99),
        };
        (config, root)
    }

    #[test]
    fn test_state_machine() {
        let (config, root) = config("states");
        let mut engine = MetropolisEngine::new(&config, &root);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.initialize();
        assert_eq!(engine.state(), EngineState::Running);
        engine.run();
        assert_eq!(engine.state(), EngineState::Finished);
        assert_eq!(engine.step(), 500);

        let monitor = engine.monitor();
        assert!(monitor.is_finished());
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.step, 500);
        assert_eq!(snapshot.values.len(), 1);
        assert!(snapshot.finished && !snapshot.failed);
        assert!(root.join(config.folder()).join("config.dat").is_file());

        // terminal: stop after finishing changes nothing
        engine.stop();
        engine.run();
        assert_eq!(engine.state(), EngineState::Finished);
    }

    #[test]
    fn test_stop_before_run_keeps_initial_state() {
        let (config, root) = config("stop");
        let mut engine = MetropolisEngine::new(&config, &root);
        engine.stop();
        engine.run();
        assert_eq!(engine.step(), 0);
        assert_eq!(engine.state(), EngineState::Finished);
        assert!(engine.monitor().is_finished());
    }

    #[test]
    fn test_uncreatable_folder_finishes_immediately() {
        let (config, root) = config("blocked");
        std::fs::create_dir_all(root.parent().unwrap()).unwrap();
        // a plain file where the output root should be
        std::fs::write(&root, b"not a directory").unwrap();
        let mut engine = MetropolisEngine::new(&config, &root);
        engine.run();
        assert_eq!(engine.state(), EngineState::Finished);
        assert_eq!(engine.step(), 0);
        assert!(engine.monitor().snapshot().failed);
        std::fs::remove_file(&root).unwrap();
    }

    #[test]
    fn test_equilibration_steps_are_not_sampled() {
        let (mut config, root) = config("equilibration");
        config.equilibration_steps = 200;
        config.averaging_points = Some(1_000);
        let mut engine = MetropolisEngine::new(&config, &root);
        engine.run();
        assert_eq!(engine.step(), 500);
        let snapshot = engine.monitor().snapshot();
        assert!(snapshot.values[0].is_finite());
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let (config, root) = config("seed_a");
        let other_root = fresh_root("seed_b");
        let mut first = MetropolisEngine::new(&config, &root);
        let mut second = MetropolisEngine::new(&config, &other_root);
        first.run();
        second.run();
        assert_eq!(first.monitor().snapshot().values, second.monitor().snapshot().values);
        assert_eq!(
            std::fs::read_to_string(first.folder().join("config.dat")).unwrap(),
            std::fs::read_to_string(second.folder().join("config.dat")).unwrap()
        );
    }

    #[test]
    fn test_shelf_pair_average_energy_within_plateau_depth() {
        let (mut config, root) = config("shelf_pair");
        config.temperature = 100;
        config.density = 5e14;
        config.particles = 2;
        config.steps = 10_000;
        // the cell is wider than the plateau, so the pair also samples the Coulomb tail
        let cutoff = crate::potential::Shelf::new(100.0, 4.0).cutoff();
        assert!(config.box_width() > 2.0 * cutoff);

        let mut engine = MetropolisEngine::new(&config, &root);
        engine.run();
        let per_particle = engine.monitor().snapshot().values[0];
        let average = per_particle * 2.0;
        assert!(average >= -4.0 && average < 0.0, "average energy {}", average);
    }
}
