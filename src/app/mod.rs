mod controller;
pub mod orchestrator;
pub mod pool;
pub mod sweeper;

pub use controller::{AppController, AppPaths};
pub use orchestrator::JobOrchestrator;
pub use pool::{WorkerLease, WorkerPool};
pub use sweeper::{RetentionSweeper, SweepReport};
