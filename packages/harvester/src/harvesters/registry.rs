use std::sync::Arc;

use super::{
    EurexpoHarvester, HarvestContext, Harvester, ParcChanotHarvester, SalonsAgendaHarvester,
    ViparisHarvester,
};

/// Ordered set of harvesters; run order is registration order.
#[derive(Clone, Default)]
pub struct HarvesterRegistry {
    harvesters: Vec<Arc<dyn Harvester>>,
}

impl HarvesterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in source sharing one context.
    pub fn with_default_sources(ctx: HarvestContext) -> Self {
        Self::new()
            .register(Arc::new(ViparisHarvester::new(ctx.clone())))
            .register(Arc::new(EurexpoHarvester::new(ctx.clone())))
            .register(Arc::new(ParcChanotHarvester::new(ctx.clone())))
            .register(Arc::new(SalonsAgendaHarvester::new(ctx)))
    }

    pub fn register(mut self, harvester: Arc<dyn Harvester>) -> Self {
        self.harvesters.push(harvester);
        self
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn Harvester>> {
        self.harvesters.iter().find(|h| h.source() == source).cloned()
    }

    pub fn sources(&self) -> Vec<String> {
        self.harvesters.iter().map(|h| h.source().to_string()).collect()
    }

    pub fn harvesters(&self) -> &[Arc<dyn Harvester>] {
        &self.harvesters
    }

    pub fn len(&self) -> usize {
        self.harvesters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harvesters.is_empty()
    }
}
