//! Server dependencies shared by routes and scheduled tasks.

use anyhow::{Context, Result};
use harvester::{
    EventStore, HarvestConfig, HarvestContext, HarvesterRegistry, Orchestrator, RetryingFetcher,
};
use std::sync::Arc;

/// Central dependency container (traits behind `Arc` for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn EventStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl ServerDeps {
    /// Production wiring: retrying HTTP fetcher and every built-in source.
    pub fn new(store: Arc<dyn EventStore>, config: HarvestConfig) -> Result<Self> {
        let fetcher = RetryingFetcher::new(config.fetch.clone()).context("Failed to build HTTP client")?;
        let ctx = HarvestContext::new(Arc::new(fetcher), &config);
        Self::with_registry(HarvesterRegistry::with_default_sources(ctx), store, config)
    }

    pub fn with_registry(
        registry: HarvesterRegistry,
        store: Arc<dyn EventStore>,
        config: HarvestConfig,
    ) -> Result<Self> {
        let orchestrator =
            Orchestrator::new(registry, store.clone(), config).context("Failed to build orchestrator")?;
        Ok(Self {
            store,
            orchestrator: Arc::new(orchestrator),
        })
    }
}
