//! Controller module - runs many state points concurrently and aggregates their results.

mod pool;
mod status;

pub use pool::{default_workers, WorkerPool};
pub use status::{PointStatus, StatusBoard, HISTORY_LENGTH};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, WrapErr};
use rand::Rng;
use tracing::{info, warn};

use crate::io::Configuration;
use crate::sampling::MetropolisEngine;

/// Aggregate files are rewritten on every n-th poll.
const PERSIST_EVERY: usize = 5;
/// Granularity of the interruptible sleeps.
const TICK: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub workers: usize,
    pub refresh: Duration,
    /// How long to wait quietly for engines to honor a stop before warning; the controller
    /// still returns only after every engine has written its final checkpoint
    pub grace: Duration,
    /// Upper bound of the random delay between submissions
    pub stagger: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            refresh: Duration::from_secs(10),
            grace: Duration::from_millis(1000),
            stagger: Duration::from_millis(100),
        }
    }
}

/// Process-level stop signal. Cloneable, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct ControllerHandle {
    stop: Arc<AtomicBool>,
}

impl ControllerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

pub struct SimulationController {
    output_root: PathBuf,
    options: ControllerOptions,
    engines: Vec<MetropolisEngine>,
    handle: ControllerHandle,
}

impl SimulationController {
    /// One engine per configuration. The configurations are expected to have distinct folders.
    pub fn new(configurations: &[Configuration], output_root: &Path, options: ControllerOptions) -> Self {
        let engines = configurations
            .iter()
            .map(|config| MetropolisEngine::new(config, output_root))
            .collect();
        Self::with_engines(engines, output_root, options)
    }

    pub fn with_engines(engines: Vec<MetropolisEngine>, output_root: &Path, options: ControllerOptions) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            options,
            engines,
            handle: ControllerHandle::default(),
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Run every engine to completion or until the handle is stopped. Returns the final
    /// status of each point in submission order.
    pub fn run(self) -> Result<Vec<PointStatus>> {
        std::fs::create_dir_all(&self.output_root)
            .wrap_err_with(|| format!("Failed to create output root {}", self.output_root.display()))?;

        let pool = WorkerPool::new(self.options.workers)?;
        info!(points = self.engines.len(), workers = pool.workers(), "starting simulations");

        let entries = self
            .engines
            .iter()
            .map(|engine| {
                let monitor = engine.monitor();
                let (temperature, file) = engine.results_target();
                let status = PointStatus::new(monitor.tag().to_string(), temperature, file.to_string());
                (monitor, status)
            })
            .collect();
        let mut board = StatusBoard::new(entries);

        let mut rng = rand::thread_rng();
        let stagger_ms = self.options.stagger.as_millis() as u64;
        for engine in self.engines {
            if self.handle.is_stopped() {
                engine.monitor().mark_finished(false);
                continue;
            }
            pool.submit(engine);
            if stagger_ms > 0 {
                thread::sleep(Duration::from_millis(rng.gen_range(0..=stagger_ms)));
            }
        }

        let mut polls = 0;
        loop {
            if !sleep_unless_stopped(self.options.refresh, &self.handle, &board) {
                break;
            }
            board.poll();
            polls += 1;
            for status in board.statuses() {
                info!("{}", status.status_line());
            }
            if polls % PERSIST_EVERY == 0 {
                persist(&board, &self.output_root);
            }
            if board.all_finished() {
                break;
            }
        }

        if self.handle.is_stopped() {
            info!("stopping all simulations");
            for monitor in board.monitors() {
                monitor.stop();
            }
            let deadline = Instant::now() + self.options.grace;
            while !board.all_finished() && Instant::now() < deadline {
                thread::sleep(TICK);
            }
            if !board.all_finished() {
                warn!("some simulations did not stop within the grace period, waiting for their final checkpoints");
                while !board.all_finished() {
                    thread::sleep(TICK);
                }
            }
        }

        board.poll();
        for status in board.statuses() {
            info!("{}", status.status_line());
        }
        persist(&board, &self.output_root);
        drop(pool);

        Ok(board.statuses().cloned().collect())
    }
}

/// Sleep for `period`, waking early on stop or when everything finished. Returns `false` on stop.
fn sleep_unless_stopped(period: Duration, handle: &ControllerHandle, board: &StatusBoard) -> bool {
    let deadline = Instant::now() + period;
    while Instant::now() < deadline {
        if handle.is_stopped() {
            return false;
        }
        if board.all_finished() {
            return true;
        }
        thread::sleep(TICK.min(period));
    }
    !handle.is_stopped()
}

fn persist(board: &StatusBoard, root: &Path) {
    if let Err(err) = board.persist(root) {
        warn!("{:#}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_shared() {
        let handle = ControllerHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_stopped());
        clone.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_empty_controller_finishes() {
        let root = std::env::temp_dir().join(format!("plasma_mc_controller_empty_{}", std::process::id()));
        let options = ControllerOptions {
            workers: 2,
            refresh: Duration::from_millis(10),
            ..Default::default()
        };
        let statuses = SimulationController::new(&[], &root, options).run().unwrap();
        assert!(statuses.is_empty());
    }
}
