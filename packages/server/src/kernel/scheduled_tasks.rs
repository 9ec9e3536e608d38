//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (HARVEST_SCHEDULE)
//!     │
//!     └─► Orchestrator::try_run()
//!             └─► skipped when a run (scheduled or manual) is still going
//! ```

use anyhow::Result;
use harvester::{HarvestError, Orchestrator, SourceRunResult};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::kernel::ServerDeps;

/// Start the periodic harvest.
pub async fn start_scheduler(deps: &ServerDeps, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let orchestrator = deps.orchestrator.clone();
    let harvest_job = Job::new_async(schedule, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            run_scheduled_harvest(&orchestrator).await;
        })
    })?;

    scheduler.add(harvest_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Scheduled harvest started");
    Ok(scheduler)
}

/// Run one harvest unless another is already in progress.
pub async fn run_scheduled_harvest(orchestrator: &Arc<Orchestrator>) -> Option<Vec<SourceRunResult>> {
    tracing::info!("Running scheduled harvest");

    match orchestrator.try_run().await {
        Ok(results) => {
            let inserted: usize = results.iter().map(|r| r.events_inserted).sum();
            let updated: usize = results.iter().map(|r| r.events_updated).sum();
            tracing::info!(
                sources = results.len(),
                inserted,
                updated,
                "Scheduled harvest complete"
            );
            Some(results)
        }
        Err(HarvestError::AlreadyRunning) => {
            tracing::warn!("Skipping scheduled harvest: previous run still in progress");
            None
        }
        Err(e) => {
            tracing::error!("Scheduled harvest failed: {}", e);
            None
        }
    }
}
