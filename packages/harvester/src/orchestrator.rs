//! Run harvesters, classify their candidates, persist what passes admission.
//!
//! Each source gets its own [`SourceRunResult`]; a failing source never stops
//! the others. Cancellation is per source and cooperative: a cancelled source
//! stops between candidates, keeping whatever it already wrote.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, KeywordCatalogue};
use crate::config::{AdmissionPolicy, ExecutionMode, HarvestConfig};
use crate::error::{HarvestError, Result};
use crate::harvesters::{Harvester, HarvesterRegistry};
use crate::stores::EventStore;
use crate::type_rules::TypeRuleEngine;
use crate::types::classification::ClassificationResult;
use crate::types::persisted::NewEvent;
use crate::types::run::{SourceRunResult, PERSIST_ERROR_PREFIX};

/// Whether a classified candidate may be persisted.
pub fn is_admitted(classification: &ClassificationResult, policy: &AdmissionPolicy) -> bool {
    classification.is_professional && classification.confidence > policy.min_confidence
}

#[derive(Default)]
struct Cancellation {
    /// Parent of every source token; replaced after `cancel_all`
    root: CancellationToken,
    next_id: u64,
    /// Running harvests per source; one source may be harvested by several
    /// ungated calls at once
    active: HashMap<String, Vec<(u64, CancellationToken)>>,
}

pub struct Orchestrator {
    registry: HarvesterRegistry,
    classifier: Classifier,
    type_rules: TypeRuleEngine,
    store: Arc<dyn EventStore>,
    config: HarvestConfig,
    cancellation: Mutex<Cancellation>,
    exclusive: AtomicBool,
}

/// Clears the exclusive-run flag on drop.
struct ExclusiveRun<'a>(&'a AtomicBool);

impl Drop for ExclusiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    /// Build with the keyword catalogue named in `config`, or the built-in one.
    pub fn new(registry: HarvesterRegistry, store: Arc<dyn EventStore>, config: HarvestConfig) -> Result<Self> {
        let catalogue = match &config.keyword_catalogue_path {
            Some(path) => {
                info!(path = %path.display(), "Loading keyword catalogue");
                KeywordCatalogue::load(path)?
            }
            None => KeywordCatalogue::default(),
        };
        Ok(Self::with_classifier(registry, store, config, Classifier::new(catalogue)))
    }

    pub fn with_classifier(
        registry: HarvesterRegistry,
        store: Arc<dyn EventStore>,
        config: HarvestConfig,
        classifier: Classifier,
    ) -> Self {
        Self {
            registry,
            classifier,
            type_rules: TypeRuleEngine::new(),
            store,
            config,
            cancellation: Mutex::new(Cancellation::default()),
            exclusive: AtomicBool::new(false),
        }
    }

    pub fn sources(&self) -> Vec<String> {
        self.registry.sources()
    }

    /// True while a [`try_run`](Self::try_run) is in progress.
    pub fn is_running(&self) -> bool {
        self.exclusive.load(Ordering::SeqCst)
    }

    /// Like [`run`](Self::run), but refuses to start while another
    /// `try_run` is in progress.
    pub async fn try_run(&self) -> Result<Vec<SourceRunResult>> {
        if self
            .exclusive
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HarvestError::AlreadyRunning);
        }
        let _guard = ExclusiveRun(&self.exclusive);
        Ok(self.run().await)
    }

    /// Like [`run_source`](Self::run_source), under the same exclusivity as
    /// [`try_run`](Self::try_run).
    pub async fn try_run_source(&self, source: &str) -> Result<Option<SourceRunResult>> {
        if self
            .exclusive
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HarvestError::AlreadyRunning);
        }
        let _guard = ExclusiveRun(&self.exclusive);
        Ok(self.run_source(source).await)
    }

    /// Run every registered harvester once; one result per source, in
    /// registration order.
    pub async fn run(&self) -> Vec<SourceRunResult> {
        let harvesters = self.registry.harvesters();
        info!(
            sources = harvesters.len(),
            mode = ?self.config.execution_mode,
            fallback = self.config.allow_fallback_data,
            "Starting harvest run"
        );

        // Every source of this run descends from the same root
        let root = self.root_token();
        let results = match self.config.execution_mode {
            ExecutionMode::Concurrent => {
                join_all(harvesters.iter().map(|h| self.run_tracked(h.as_ref(), &root))).await
            }
            ExecutionMode::Sequential => {
                let pause = Duration::from_millis(self.config.source_pause_ms);
                let mut results = Vec::with_capacity(harvesters.len());
                for (index, harvester) in harvesters.iter().enumerate() {
                    if index > 0 && !pause.is_zero() {
                        tokio::select! {
                            _ = root.cancelled() => {}
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                    results.push(self.run_tracked(harvester.as_ref(), &root).await);
                }
                results
            }
        };

        let inserted: usize = results.iter().map(|r| r.events_inserted).sum();
        let updated: usize = results.iter().map(|r| r.events_updated).sum();
        let failed = results.iter().filter(|r| !r.success).count();
        info!(inserted, updated, failed_sources = failed, "Harvest run finished");
        results
    }

    /// Run a single source by name, outside of a full run.
    pub async fn run_source(&self, source: &str) -> Option<SourceRunResult> {
        let harvester = self.registry.get(source)?;
        let root = self.root_token();
        Some(self.run_tracked(harvester.as_ref(), &root).await)
    }

    /// Cancel a running source. Returns false when it is not running.
    pub fn cancel_source(&self, source: &str) -> bool {
        let state = self.cancellation.lock().unwrap_or_else(PoisonError::into_inner);
        match state.active.get(source) {
            Some(running) if !running.is_empty() => {
                info!(source = %source, runs = running.len(), "Cancelling source");
                for (_, token) in running {
                    token.cancel();
                }
                true
            }
            _ => false,
        }
    }

    /// Cancel every running source, including the not yet started sources
    /// of a sequential run. Later runs start with fresh tokens.
    pub fn cancel_all(&self) {
        let mut state = self.cancellation.lock().unwrap_or_else(PoisonError::into_inner);
        info!(active = state.active.len(), "Cancelling all sources");
        state.root.cancel();
        state.root = CancellationToken::new();
    }

    /// Sources currently being harvested.
    pub fn active_sources(&self) -> Vec<String> {
        let state = self.cancellation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sources: Vec<String> = state.active.keys().cloned().collect();
        sources.sort();
        sources
    }

    fn root_token(&self) -> CancellationToken {
        self.cancellation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .root
            .clone()
    }

    async fn run_tracked(&self, harvester: &dyn Harvester, root: &CancellationToken) -> SourceRunResult {
        let source = harvester.source().to_string();
        let token = root.child_token();
        let id = {
            let mut state = self.cancellation.lock().unwrap_or_else(PoisonError::into_inner);
            let id = state.next_id;
            state.next_id += 1;
            state.active.entry(source.clone()).or_default().push((id, token.clone()));
            id
        };

        let result = self.harvest_source(harvester, &token).await;

        // Only this call's entry; a concurrent harvest of the same source stays cancellable
        let mut state = self.cancellation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = state.active.get_mut(&source) {
            running.retain(|(entry, _)| *entry != id);
            if running.is_empty() {
                state.active.remove(&source);
            }
        }
        result
    }

    async fn harvest_source(&self, harvester: &dyn Harvester, token: &CancellationToken) -> SourceRunResult {
        let source = harvester.source();
        let mut result = SourceRunResult::new(source);
        info!(source = %source, "Harvesting source");

        let batch = tokio::select! {
            _ = token.cancelled() => {
                warn!(source = %source, "Source cancelled while scraping");
                return Self::cancelled(result);
            }
            batch = harvester.scrape_events() => batch,
        };

        result.events_found = batch.events.len();
        result.used_fallback = batch.used_fallback;
        result.errors.extend(batch.errors);

        let mut attempted = 0usize;
        let mut failed = 0usize;

        for candidate in batch.events {
            if token.is_cancelled() {
                warn!(source = %source, processed = result.events_processed, "Source cancelled");
                return Self::cancelled(result);
            }

            let candidate = candidate.normalized();
            let classification = self.classifier.classify_candidate(&candidate);
            result.events_processed += 1;

            if !is_admitted(&classification, &self.config.admission) {
                debug!(
                    source = %source,
                    title = %candidate.title,
                    score = classification.professional_score,
                    confidence = classification.confidence,
                    "Candidate not admitted"
                );
                continue;
            }

            attempted += 1;
            let event_type = self.type_rules.detect_candidate(&candidate);
            let event = NewEvent::from_candidate(&candidate, &classification, event_type, Utc::now());

            match self.store.upsert_by_website(event).await {
                Ok(outcome) => {
                    result.events_admitted += 1;
                    if outcome.was_inserted {
                        result.events_inserted += 1;
                    } else {
                        result.events_updated += 1;
                    }
                    debug!(
                        source = %source,
                        title = %candidate.title,
                        id = %outcome.id,
                        inserted = outcome.was_inserted,
                        "Persisted event"
                    );
                }
                Err(e) => {
                    failed += 1;
                    error!(source = %source, title = %candidate.title, error = %e, "Failed to persist event");
                    result
                        .errors
                        .push(format!("{}: {}: {}", PERSIST_ERROR_PREFIX, candidate.title, e));
                }
            }
        }

        result.success = attempted == 0 || failed < attempted;
        result.finished_at = Utc::now();
        info!(
            source = %source,
            found = result.events_found,
            admitted = result.events_admitted,
            inserted = result.events_inserted,
            updated = result.events_updated,
            fallback = result.used_fallback,
            errors = result.errors.len(),
            "Source finished"
        );
        result
    }

    fn cancelled(mut result: SourceRunResult) -> SourceRunResult {
        result.success = false;
        result.cancelled = true;
        result.errors.push(HarvestError::Cancelled.to_string());
        result.finished_at = Utc::now();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvesters::HarvestBatch;
    use crate::stores::MemoryStore;
    use crate::testing::{FailingStore, StaticHarvester};
    use crate::types::candidate::CandidateEvent;
    use chrono::NaiveDate;

    fn classification(score: f64, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            is_professional: score >= 0.6,
            professional_score: score,
            sector: "Other".to_string(),
            tags: vec![],
            confidence,
        }
    }

    fn salon(title: &str, website: &str) -> CandidateEvent {
        CandidateEvent::new(title, NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), website, "static")
            .with_description("Salon professionnel b2b de la robotique industrielle")
    }

    fn concert(website: &str) -> CandidateEvent {
        CandidateEvent::new("Concert de jazz", NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), website, "static")
    }

    fn orchestrator(harvesters: Vec<Arc<StaticHarvester>>, store: Arc<dyn EventStore>) -> Orchestrator {
        let registry = harvesters
            .into_iter()
            .fold(HarvesterRegistry::new(), |registry, h| registry.register(h));
        Orchestrator::new(registry, store, HarvestConfig::immediate()).unwrap()
    }

    #[test]
    fn test_admission_thresholds() {
        let policy = AdmissionPolicy::default();
        assert!(!is_admitted(&classification(0.59, 0.59), &policy));
        assert!(is_admitted(&classification(0.61, 0.61), &policy));
        // professional but exactly at the confidence floor
        assert!(!is_admitted(&classification(0.6, 0.5), &policy));
        assert!(is_admitted(&classification(0.6, 0.51), &policy));
        assert!(!is_admitted(&classification(0.2, 0.8), &policy));
    }

    #[tokio::test]
    async fn test_run_admits_professional_only() {
        let store = Arc::new(MemoryStore::new());
        let harvester = Arc::new(StaticHarvester::new(
            "static",
            vec![salon("Salon Robotique", "https://a.fr/robotique"), concert("https://a.fr/jazz")],
        ));
        let orchestrator = orchestrator(vec![harvester], store.clone());

        let results = orchestrator.run().await;
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.success);
        assert_eq!(result.events_found, 2);
        assert_eq!(result.events_processed, 2);
        assert_eq!(result.events_admitted, 1);
        assert_eq!(result.events_inserted, 1);
        assert_eq!(result.events_rejected(), 1);

        let stored = store.find_by_website("https://a.fr/robotique").await.unwrap().unwrap();
        assert_eq!(stored.event_type, "trade-fair");
        assert_eq!(stored.sector, "Industrie");
        assert!(store.find_by_website("https://a.fr/jazz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_run_updates() {
        let store = Arc::new(MemoryStore::new());
        let harvester = Arc::new(StaticHarvester::new(
            "static",
            vec![salon("Salon Robotique", "https://a.fr/robotique")],
        ));
        let orchestrator = orchestrator(vec![harvester], store.clone());

        let first = orchestrator.run().await;
        let second = orchestrator.run().await;
        assert_eq!(first[0].events_inserted, 1);
        assert_eq!(second[0].events_inserted, 0);
        assert_eq!(second[0].events_updated, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_per_candidate() {
        let store = Arc::new(FailingStore::for_websites(["https://a.fr/broken"]));
        let harvester = Arc::new(StaticHarvester::new(
            "static",
            vec![
                salon("Salon Cassé", "https://a.fr/broken"),
                salon("Salon Robotique", "https://a.fr/robotique"),
            ],
        ));
        let orchestrator = orchestrator(vec![harvester], store.clone());

        let result = orchestrator.run().await.remove(0);
        assert!(result.success);
        assert_eq!(result.events_admitted, 1);
        assert_eq!(result.persistence_failures(), 1);
        assert!(result.errors[0].contains("Salon Cassé"));
        assert_eq!(store.inner().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_all_writes_failing_marks_source_failed() {
        let store = Arc::new(FailingStore::all());
        let harvester = Arc::new(StaticHarvester::new(
            "static",
            vec![salon("Salon Robotique", "https://a.fr/robotique")],
        ));
        let result = orchestrator(vec![harvester], store).run().await.remove(0);
        assert!(!result.success);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_source_errors_do_not_fail_others() {
        let store = Arc::new(MemoryStore::new());
        let broken = Arc::new(
            StaticHarvester::new("broken", vec![]).with_batch(HarvestBatch::live(
                vec![],
                vec!["https://broken.fr: HTTP 503".to_string()],
            )),
        );
        let healthy = Arc::new(StaticHarvester::new(
            "healthy",
            vec![salon("Salon Robotique", "https://a.fr/robotique")],
        ));
        let results = orchestrator(vec![broken, healthy], store).run().await;

        assert_eq!(results[0].source, "broken");
        assert!(results[0].success);
        assert_eq!(results[0].errors.len(), 1);
        assert_eq!(results[1].events_inserted, 1);
    }

    #[tokio::test]
    async fn test_used_fallback_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let harvester = Arc::new(StaticHarvester::new("static", vec![]).with_batch(HarvestBatch {
            events: vec![salon("Salon Robotique", "https://a.fr/robotique")],
            used_fallback: true,
            errors: vec![],
        }));
        let result = orchestrator(vec![harvester], store).run().await.remove(0);
        assert!(result.used_fallback);
        assert_eq!(result.events_inserted, 1);
    }

    #[tokio::test]
    async fn test_cancel_one_source() {
        let store = Arc::new(MemoryStore::new());
        let slow = Arc::new(
            StaticHarvester::new("slow", vec![salon("Salon Lent", "https://a.fr/lent")])
                .with_delay(Duration::from_secs(30)),
        );
        let fast = Arc::new(StaticHarvester::new(
            "fast",
            vec![salon("Salon Rapide", "https://a.fr/rapide")],
        ));
        let registry = HarvesterRegistry::new().register(slow).register(fast);
        let orchestrator = Arc::new(
            Orchestrator::new(
                registry,
                store.clone(),
                HarvestConfig::immediate().with_execution_mode(ExecutionMode::Concurrent),
            )
            .unwrap(),
        );

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run().await })
        };

        // wait for the slow source to register
        while !orchestrator.active_sources().contains(&"slow".to_string()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(orchestrator.cancel_source("slow"));
        assert!(!orchestrator.cancel_source("missing"));

        let results = running.await.unwrap();
        assert!(results[0].cancelled);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(results[1].events_inserted, 1);
        assert!(store.find_by_website("https://a.fr/rapide").await.unwrap().is_some());
        assert!(store.find_by_website("https://a.fr/lent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_all_then_run_again() {
        let store = Arc::new(MemoryStore::new());
        let slow = Arc::new(
            StaticHarvester::new("slow", vec![salon("Salon Lent", "https://a.fr/lent")])
                .with_delay(Duration::from_millis(200)),
        );
        let orchestrator = Arc::new(orchestrator(vec![slow.clone()], store.clone()));

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run().await })
        };
        while orchestrator.active_sources().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        orchestrator.cancel_all();
        assert!(running.await.unwrap()[0].cancelled);

        let again = orchestrator.run().await;
        assert!(again[0].success);
        assert_eq!(again[0].events_inserted, 1);
        assert_eq!(slow.run_count(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_harvests_of_one_source_stay_cancellable() {
        let store = Arc::new(MemoryStore::new());
        let slow = Arc::new(
            StaticHarvester::new("slow", vec![salon("Salon Lent", "https://a.fr/lent")])
                .with_delay(Duration::from_millis(600)),
        );
        let orchestrator = Arc::new(orchestrator(vec![slow.clone()], store));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run_source("slow").await })
        };
        while slow.run_count() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run_source("slow").await })
        };
        while slow.run_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // the first harvest finishing must not untrack the second
        let first = first.await.unwrap().unwrap();
        assert!(first.success);
        assert_eq!(orchestrator.active_sources(), vec!["slow".to_string()]);

        assert!(orchestrator.cancel_source("slow"));
        let second = second.await.unwrap().unwrap();
        assert!(second.cancelled);
        assert!(orchestrator.active_sources().is_empty());
    }

    #[tokio::test]
    async fn test_try_run_source_runs_only_that_source() {
        let store = Arc::new(MemoryStore::new());
        let a = Arc::new(StaticHarvester::new("a", vec![salon("Salon A", "https://a.fr/a")]));
        let b = Arc::new(StaticHarvester::new("b", vec![salon("Salon B", "https://a.fr/b")]));
        let orchestrator = orchestrator(vec![a.clone(), b.clone()], store.clone());

        let result = orchestrator.try_run_source("b").await.unwrap().unwrap();
        assert_eq!(result.source, "b");
        assert_eq!(result.events_inserted, 1);
        assert_eq!(a.run_count(), 0);
        assert_eq!(b.run_count(), 1);

        assert!(orchestrator.try_run_source("missing").await.unwrap().is_none());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_try_run_is_exclusive() {
        let store = Arc::new(MemoryStore::new());
        let slow = Arc::new(StaticHarvester::new("slow", vec![]).with_delay(Duration::from_millis(200)));
        let orchestrator = Arc::new(orchestrator(vec![slow], store));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.try_run().await })
        };
        while !orchestrator.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(orchestrator.try_run().await, Err(HarvestError::AlreadyRunning)));
        assert!(first.await.unwrap().is_ok());
        assert!(!orchestrator.is_running());
    }
}
