//! plasma_mc - Metropolis Monte Carlo for classical electron-ion plasmas
//!
//! This crate samples neutral ion-electron systems in periodic cubic cells with a choice of
//! pair potentials (shelf, Ewald, Harrison, pseudo-potential, Lennard-Jones), in either the
//! canonical single-box ensemble or the two-box Gibbs ensemble. Many state points run
//! concurrently on a worker pool; each checkpoints into its own folder.

pub mod constants;
pub mod controller;
pub mod geometry;
pub mod io;
pub mod particles;
pub mod potential;
pub mod sampling;

// Re-export commonly used types at crate root
pub use controller::{ControllerHandle, ControllerOptions, PointStatus, SimulationController};
pub use geometry::{fold_position, wrap, PeriodicBox};
pub use io::{load_run_file, Configuration, EnsembleKind, GibbsParameters, GibbsSchedule, RunFile};
pub use particles::{SingleBoxParticles, TwoBoxParticles};
pub use potential::{build_potential, PairKind, PotentialKind, PotentialModel, Species};
pub use sampling::{
    Ensemble, EngineMonitor, EngineState, GibbsEnsemble, MetropolisEngine, NvtEnsemble, RandomSource,
    SimulationResult, TrialMove,
};
