//! Event persistence.
//!
//! Available backends:
//! - `MemoryStore` - in-memory storage (always available)
//! - `PostgresStore` - PostgreSQL storage (requires `postgres` feature)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::persisted::{NewEvent, PersistedEvent, UpsertOutcome};

/// Durable home of harvested events, keyed by `website`.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_website(&self, website: &str) -> StoreResult<Option<PersistedEvent>>;

    /// Insert, or overwrite the descriptive fields of the record with the
    /// same website. Atomic per website: concurrent callers never create
    /// two records.
    async fn upsert_by_website(&self, event: NewEvent) -> StoreResult<UpsertOutcome>;

    async fn count(&self) -> StoreResult<usize>;

    async fn list_by_source(&self, source: &str) -> StoreResult<Vec<PersistedEvent>>;

    /// Cheap liveness check for the health route.
    async fn ping(&self) -> StoreResult<()>;
}
