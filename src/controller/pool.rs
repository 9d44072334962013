//! Fixed-size worker pool. One engine per task, panics contained at the task boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use color_eyre::eyre::{Result, WrapErr};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use crate::sampling::MetropolisEngine;

/// Default pool size: half the available cores, at least two.
pub fn default_workers() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    (cores / 2).max(2)
}

pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mc-worker-{}", i))
            .build()
            .wrap_err_with(|| format!("Failed to build a pool of {} workers", workers))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue an engine. Tasks start in submission order once a worker is free.
    pub fn submit(&self, mut engine: MetropolisEngine) {
        let monitor = engine.monitor();
        self.pool.spawn_fifo(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.run()));
            if let Err(payload) = outcome {
                error!(point = %monitor.point(), "engine aborted: {}", panic_message(payload.as_ref()));
                monitor.mark_finished(true);
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
