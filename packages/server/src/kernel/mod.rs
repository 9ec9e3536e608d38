//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod scheduled_tasks;

pub use deps::ServerDeps;
pub use scheduled_tasks::{run_scheduled_harvest, start_scheduler};
