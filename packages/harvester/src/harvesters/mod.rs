//! Per-source harvesters and the machinery they share.
//!
//! A harvester turns one organization's agenda pages into candidate events.
//! It never fails as a whole: page-level failures are collected into the
//! batch's `errors` and the remaining pages are still scraped.

pub mod eurexpo;
pub mod listing;
pub mod parc_chanot;
pub mod registry;
pub mod salons_agenda;
pub mod viparis;

pub use eurexpo::EurexpoHarvester;
pub use parc_chanot::ParcChanotHarvester;
pub use registry::HarvesterRegistry;
pub use salons_agenda::SalonsAgendaHarvester;
pub use viparis::ViparisHarvester;

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::fetcher::PageFetcher;
use crate::types::candidate::CandidateEvent;

/// One organization's event source.
#[async_trait]
pub trait Harvester: Send + Sync {
    /// Stable identifier, recorded as `source` on every candidate
    fn source(&self) -> &str;

    /// Scrape every listing page of this source.
    async fn scrape_events(&self) -> HarvestBatch;
}

/// What a harvester hands back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestBatch {
    pub events: Vec<CandidateEvent>,
    /// Events are the harvester's built-in examples, not live data
    pub used_fallback: bool,
    /// Page-level failures, one message per page
    pub errors: Vec<String>,
}

impl HarvestBatch {
    pub fn live(events: Vec<CandidateEvent>, errors: Vec<String>) -> Self {
        Self {
            events,
            used_fallback: false,
            errors,
        }
    }
}

/// Venue facts used when a listing leaves them out.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueProfile {
    pub name: String,
    pub city: String,
    pub address: String,
    pub visitors: RangeInclusive<u32>,
    pub exhibitors: RangeInclusive<u32>,
}

impl VenueProfile {
    pub fn new(name: &str, city: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            city: city.to_string(),
            address: address.to_string(),
            visitors: 1_000..=10_000,
            exhibitors: 20..=200,
        }
    }

    pub fn with_attendance(mut self, visitors: RangeInclusive<u32>, exhibitors: RangeInclusive<u32>) -> Self {
        self.visitors = visitors;
        self.exhibitors = exhibitors;
        self
    }
}

/// An agenda page and the venue it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub url: String,
    pub venue: VenueProfile,
}

impl SourcePage {
    pub fn new(url: impl Into<String>, venue: VenueProfile) -> Self {
        Self {
            url: url.into(),
            venue,
        }
    }
}

/// Shared dependencies and pacing for every harvester.
#[derive(Clone)]
pub struct HarvestContext {
    fetcher: Arc<dyn PageFetcher>,
    allow_fallback_data: bool,
    request_delay_ms: RangeInclusive<u64>,
}

impl HarvestContext {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &HarvestConfig) -> Self {
        Self {
            fetcher,
            allow_fallback_data: config.allow_fallback_data,
            request_delay_ms: config.request_delay_range(),
        }
    }

    /// No delays, no fallback data.
    pub fn immediate(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::new(fetcher, &HarvestConfig::immediate())
    }

    pub fn with_fallback_data(mut self, allow: bool) -> Self {
        self.allow_fallback_data = allow;
        self
    }

    fn request_delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.request_delay_ms.clone()))
    }

    /// Fetch `pages` one after another, pausing between requests, and run
    /// `parse` over every body that arrives.
    ///
    /// `parse` is synchronous so parsed documents never live across an await.
    pub async fn fetch_pages<F>(
        &self,
        source: &str,
        pages: &[SourcePage],
        mut parse: F,
    ) -> (Vec<CandidateEvent>, Vec<String>)
    where
        F: FnMut(&SourcePage, &str) -> Vec<CandidateEvent> + Send,
    {
        let mut events = Vec::new();
        let mut errors = Vec::new();

        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                let delay = self.request_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.fetcher.fetch(&page.url).await {
                Ok(body) => {
                    let found = parse(page, &body);
                    debug!(source = %source, url = %page.url, count = found.len(), "Parsed listing page");
                    events.extend(found);
                }
                Err(e) => {
                    warn!(source = %source, url = %page.url, error = %e, "Listing page unavailable");
                    errors.push(format!("{}: {}", page.url, e));
                }
            }
        }

        (events, errors)
    }

    /// Deduplicate the live result and apply the fallback policy.
    pub fn finish<F>(
        &self,
        source: &str,
        events: Vec<CandidateEvent>,
        errors: Vec<String>,
        fallback: F,
    ) -> HarvestBatch
    where
        F: FnOnce() -> Vec<CandidateEvent>,
    {
        let events = dedup_by_website(events);
        if !events.is_empty() || !self.allow_fallback_data {
            info!(source = %source, count = events.len(), errors = errors.len(), "Harvested live events");
            return HarvestBatch::live(events, errors);
        }

        let events = dedup_by_website(fallback());
        warn!(source = %source, count = events.len(), "No live events, using fallback data");
        HarvestBatch {
            events,
            used_fallback: true,
            errors,
        }
    }
}

/// Drop later candidates whose website was already seen, keeping order.
pub fn dedup_by_website(events: Vec<CandidateEvent>) -> Vec<CandidateEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.website.clone()))
        .collect()
}

/// Draw an attendance figure from a venue range.
pub fn estimate(range: &RangeInclusive<u32>) -> u32 {
    if range.is_empty() {
        return *range.start();
    }
    rand::thread_rng().gen_range(range.clone())
}
