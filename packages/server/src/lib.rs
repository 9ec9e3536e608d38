// Event Harvester - server
//
// Inbound trigger surface for the harvest pipeline: HTTP routes for health,
// manual runs and cancellation, plus the cron scheduler.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
