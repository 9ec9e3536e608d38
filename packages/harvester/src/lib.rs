//! Trade-Show Event Harvester
//!
//! Discovers business events (trade fairs, congresses, conventions) on French
//! venue and aggregator agendas, keeps the professional ones, and stores them
//! deduplicated by listing URL.
//!
//! # Pipeline
//!
//! 1. Harvesters fetch agenda pages through a retrying fetcher and turn each
//!    listing into a [`CandidateEvent`]
//! 2. The [`Classifier`] scores each candidate professional vs. leisure and
//!    assigns a sector and tags; the [`TypeRuleEngine`] labels its type
//! 3. The [`Orchestrator`] admits professional, confident candidates and
//!    upserts them into an [`EventStore`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use harvester::{
//!     HarvestConfig, HarvestContext, HarvesterRegistry, MemoryStore, Orchestrator, RetryingFetcher,
//! };
//!
//! let config = HarvestConfig::default();
//! let fetcher = Arc::new(RetryingFetcher::new(config.fetch.clone())?);
//! let registry = HarvesterRegistry::with_default_sources(HarvestContext::new(fetcher, &config));
//! let orchestrator = Orchestrator::new(registry, Arc::new(MemoryStore::new()), config)?;
//!
//! for result in orchestrator.run().await {
//!     println!("{}: {} inserted", result.source, result.events_inserted);
//! }
//! ```
//!
//! # Modules
//!
//! - [`normalize`] - Date, venue and URL normalization
//! - [`fetcher`] - HTTP fetching with exponential-backoff retry
//! - [`harvesters`] - Per-source harvesters and shared listing extraction
//! - [`classifier`] - Keyword classifier
//! - [`type_rules`] - Event-type rules
//! - [`orchestrator`] - Run coordination, admission and cancellation
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Test doubles

pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod harvesters;
pub mod normalize;
pub mod orchestrator;
pub mod stores;
pub mod testing;
pub mod type_rules;
pub mod types;

// Re-export core types at crate root
pub use classifier::{Classifier, KeywordCatalogue, PROFESSIONAL_THRESHOLD};
pub use config::{AdmissionPolicy, ExecutionMode, FetchConfig, HarvestConfig};
pub use error::{FetchError, HarvestError, Result, StoreError};
pub use fetcher::{PageFetcher, RetryingFetcher};
pub use harvesters::{
    dedup_by_website, HarvestBatch, HarvestContext, Harvester, HarvesterRegistry, SourcePage,
    VenueProfile,
};
pub use orchestrator::{is_admitted, Orchestrator};
pub use stores::{EventStore, MemoryStore};
pub use type_rules::TypeRuleEngine;
pub use types::{
    candidate::CandidateEvent,
    classification::{ClassificationResult, EventType, DEFAULT_SECTOR},
    persisted::{NewEvent, PersistedEvent, UpsertOutcome},
    run::SourceRunResult,
};

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
