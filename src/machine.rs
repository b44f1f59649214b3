//! Machine fleet domain: configuration model, persistence, fan-curve
//! evaluation, the per-machine apply cycle, and the cron scheduler.

pub mod apply;
pub mod curve;
pub mod scheduler;
pub mod store;
pub mod types;

pub use apply::{apply_machine, ApplyError, ApplyOutcome};
pub use scheduler::Scheduler;
pub use store::MachineStore;
pub use types::{FanCurvePoint, Machine, Preset};
