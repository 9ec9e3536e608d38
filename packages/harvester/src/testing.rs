//! Test doubles for the fetcher, harvester and store seams.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, StoreError, StoreResult};
use crate::fetcher::PageFetcher;
use crate::harvesters::{HarvestBatch, Harvester};
use crate::stores::{EventStore, MemoryStore};
use crate::types::candidate::CandidateEvent;
use crate::types::persisted::{NewEvent, PersistedEvent, UpsertOutcome};

/// Fetcher serving canned bodies by URL.
///
/// Unknown URLs answer 404; URLs registered with [`with_failure`](Self::with_failure)
/// fail as if the retry budget were spent.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, body: &str) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), body.to_string());
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.add_page(url, body);
        self
    }

    pub fn with_failure(self, url: &str) -> Self {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
        self
    }

    /// Respond only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url);
        if failing {
            return Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts: 3,
                last_error: "HTTP 503".to_string(),
            });
        }

        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Harvester returning a fixed batch.
pub struct StaticHarvester {
    source: String,
    batch: HarvestBatch,
    delay: Option<Duration>,
    runs: AtomicUsize,
}

impl StaticHarvester {
    pub fn new(source: impl Into<String>, events: Vec<CandidateEvent>) -> Self {
        Self {
            source: source.into(),
            batch: HarvestBatch::live(events, Vec::new()),
            delay: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn with_batch(mut self, batch: HarvestBatch) -> Self {
        self.batch = batch;
        self
    }

    /// Take `delay` before answering, leaving room to cancel.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Harvester for StaticHarvester {
    fn source(&self) -> &str {
        &self.source
    }

    async fn scrape_events(&self) -> HarvestBatch {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batch.clone()
    }
}

/// Store whose writes fail for chosen websites (or all of them); everything
/// else goes to an inner [`MemoryStore`].
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: HashSet<String>,
    fail_all: bool,
}

impl FailingStore {
    pub fn all() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn for_websites<I, S>(websites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: websites.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn fails(&self, website: &str) -> bool {
        self.fail_all || self.failing.contains(website)
    }
}

#[async_trait]
impl EventStore for FailingStore {
    async fn find_by_website(&self, website: &str) -> StoreResult<Option<PersistedEvent>> {
        self.inner.find_by_website(website).await
    }

    async fn upsert_by_website(&self, event: NewEvent) -> StoreResult<UpsertOutcome> {
        if self.fails(&event.website) {
            return Err(StoreError::Database(
                format!("simulated write failure for {}", event.website).into(),
            ));
        }
        self.inner.upsert_by_website(event).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }

    async fn list_by_source(&self, source: &str) -> StoreResult<Vec<PersistedEvent>> {
        self.inner.list_by_source(source).await
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.fail_all {
            return Err(StoreError::Database("simulated outage".into()));
        }
        Ok(())
    }
}
