pub mod engine;
pub mod scheduler;
pub mod state;

pub use engine::{CycleOutcome, SyncEngine};
pub use scheduler::Scheduler;
pub use state::{RefreshClass, RefreshCycle, SchedulerState, Trigger};
