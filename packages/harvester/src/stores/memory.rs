//! In-memory event store for tests and local runs. Data is lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::EventStore;
use crate::error::StoreResult;
use crate::types::persisted::{NewEvent, PersistedEvent, UpsertOutcome};

#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<String, PersistedEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PersistedEvent> {
        let mut events: Vec<PersistedEvent> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.website.cmp(&b.website)));
        events
    }

    /// Mutate a stored record in place, as an administrator would.
    pub async fn update<F>(&self, website: &str, f: F) -> bool
    where
        F: FnOnce(&mut PersistedEvent),
    {
        match self.events.write().await.get_mut(website) {
            Some(event) => {
                f(event);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_by_website(&self, website: &str) -> StoreResult<Option<PersistedEvent>> {
        Ok(self.events.read().await.get(website).cloned())
    }

    async fn upsert_by_website(&self, event: NewEvent) -> StoreResult<UpsertOutcome> {
        // Lookup and write happen under one guard
        let mut events = self.events.write().await;
        if let Some(existing) = events.get_mut(&event.website) {
            event.apply_to(existing);
            return Ok(UpsertOutcome {
                id: existing.id,
                was_inserted: false,
            });
        }

        let id = Uuid::new_v4();
        let record = event.into_persisted(id);
        events.insert(record.website.clone(), record);
        Ok(UpsertOutcome {
            id,
            was_inserted: true,
        })
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.events.read().await.len())
    }

    async fn list_by_source(&self, source: &str) -> StoreResult<Vec<PersistedEvent>> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|event| event.source == source)
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
