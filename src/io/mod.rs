//! IO module - run files, checkpoints and aggregate results.

mod checkpoint;
mod config;
mod results;

pub use checkpoint::{CheckpointStore, SingleBoxCheckpoint, TwoBoxCheckpoint};
pub use config::{
    load_run_file, short_scientific, Configuration, EnsembleKind, GibbsParameters, GibbsSchedule, PointDefaults,
    PointSpec, RunFile,
};
pub use results::{format_results, write_results, PointResult};
