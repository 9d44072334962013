//! Sampling module - Metropolis ensembles and the engine that drives them.

mod averaging;
mod correlation;
mod engine;
mod gibbs;
mod nvt;
mod rng;
mod traits;

pub use averaging::{AcceptanceTracker, DensityAverager, EnergyWindow};
pub use correlation::CorrelationHistogram;
pub use engine::{EngineMonitor, EngineState, MetropolisEngine, SimulationResult};
pub use gibbs::GibbsEnsemble;
pub use nvt::NvtEnsemble;
pub use rng::RandomSource;
pub use traits::{metropolis_accept, Cadence, Ensemble, TrialMove};
