//! Durable event records and the write model used to upsert them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::CandidateEvent;
use super::classification::{ClassificationResult, EventType};

pub const DEFAULT_COUNTRY: &str = "France";

/// A harvested event as stored, keyed by `id`, deduplicated on `website`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct PersistedEvent {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub venue_name: String,
    pub city: String,
    pub address: String,
    pub country: String,
    pub event_url: String,
    pub website: String,
    pub image_url: Option<String>,
    pub estimated_visitors: Option<i32>,
    pub estimated_exhibitors: Option<i32>,
    pub entry_fee: Option<String>,
    pub organizer_name: Option<String>,
    pub sector: String,
    pub tags: Vec<String>,
    pub event_type: String, // 'trade-fair', 'convention', ..., 'unknown'
    pub source: String,
    pub is_b2b: bool,
    pub is_visible: bool,
    pub last_scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written on insert and overwritten on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub venue_name: String,
    pub city: String,
    pub address: String,
    pub country: String,
    pub website: String,
    pub image_url: Option<String>,
    pub estimated_visitors: Option<i32>,
    pub estimated_exhibitors: Option<i32>,
    pub entry_fee: Option<String>,
    pub organizer_name: Option<String>,
    pub sector: String,
    pub tags: Vec<String>,
    pub event_type: EventType,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl NewEvent {
    /// Build the write model from a classified candidate.
    pub fn from_candidate(
        candidate: &CandidateEvent,
        classification: &ClassificationResult,
        event_type: EventType,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let candidate = candidate.clone().normalized();
        Self {
            name: candidate.title,
            description: candidate.description,
            start_date: candidate.start_date,
            end_date: candidate.end_date,
            venue_name: candidate.venue_name,
            city: candidate.city,
            address: candidate.address,
            country: DEFAULT_COUNTRY.to_string(),
            website: candidate.website,
            image_url: candidate.image_url,
            estimated_visitors: candidate.estimated_visitors.map(clamp_i32),
            estimated_exhibitors: candidate.estimated_exhibitors.map(clamp_i32),
            entry_fee: candidate.entry_fee,
            organizer_name: candidate.organizer,
            sector: classification.sector.clone(),
            tags: classification.tags.clone(),
            event_type,
            source: candidate.source,
            scraped_at,
        }
    }

    /// Materialize a fresh record (insert path).
    pub fn into_persisted(self, id: Uuid) -> PersistedEvent {
        PersistedEvent {
            id,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            venue_name: self.venue_name,
            city: self.city,
            address: self.address,
            country: self.country,
            event_url: self.website.clone(),
            website: self.website,
            image_url: self.image_url,
            estimated_visitors: self.estimated_visitors,
            estimated_exhibitors: self.estimated_exhibitors,
            entry_fee: self.entry_fee,
            organizer_name: self.organizer_name,
            sector: self.sector,
            tags: self.tags,
            event_type: self.event_type.to_string(),
            source: self.source,
            is_b2b: true,
            is_visible: true,
            last_scraped_at: self.scraped_at,
            created_at: self.scraped_at,
            updated_at: self.scraped_at,
        }
    }

    /// Overwrite the descriptive fields of an existing record (update path).
    ///
    /// Identity, creation time and visibility are administrative and survive.
    pub fn apply_to(self, existing: &mut PersistedEvent) {
        existing.name = self.name;
        existing.description = self.description;
        existing.start_date = self.start_date;
        existing.end_date = self.end_date;
        existing.venue_name = self.venue_name;
        existing.city = self.city;
        existing.address = self.address;
        existing.country = self.country;
        existing.event_url = self.website.clone();
        existing.website = self.website;
        existing.image_url = self.image_url;
        existing.estimated_visitors = self.estimated_visitors;
        existing.estimated_exhibitors = self.estimated_exhibitors;
        existing.entry_fee = self.entry_fee;
        existing.organizer_name = self.organizer_name;
        existing.sector = self.sector;
        existing.tags = self.tags;
        existing.event_type = self.event_type.to_string();
        existing.source = self.source;
        existing.last_scraped_at = self.scraped_at;
        existing.updated_at = self.scraped_at;
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Result of an upsert keyed on `website`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub was_inserted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::classification::DEFAULT_SECTOR;
    use chrono::Duration;

    fn classification() -> ClassificationResult {
        ClassificationResult {
            is_professional: true,
            professional_score: 0.8,
            sector: "Industrie".to_string(),
            tags: vec!["b2b".to_string()],
            confidence: 0.9,
        }
    }

    #[test]
    fn test_insert_sets_defaults() {
        let now = Utc::now();
        let candidate = CandidateEvent::new(
            "Global Industrie",
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
            "https://example.fr/global-industrie",
            "test",
        );
        let record = NewEvent::from_candidate(&candidate, &classification(), EventType::TradeFair, now)
            .into_persisted(Uuid::new_v4());

        assert_eq!(record.country, "France");
        assert_eq!(record.event_url, record.website);
        assert_eq!(record.event_type, "trade-fair");
        assert!(record.is_b2b);
        assert!(record.is_visible);
        assert_eq!(record.created_at, now);
        assert_eq!(record.last_scraped_at, now);
    }

    #[test]
    fn test_update_keeps_identity_and_visibility() {
        let first = Utc::now();
        let later = first + Duration::hours(6);
        let candidate = CandidateEvent::new(
            "Global Industrie",
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
            "https://example.fr/global-industrie",
            "test",
        );
        let id = Uuid::new_v4();
        let mut record = NewEvent::from_candidate(&candidate, &classification(), EventType::TradeFair, first)
            .into_persisted(id);
        record.is_visible = false;

        let mut other = classification();
        other.sector = DEFAULT_SECTOR.to_string();
        NewEvent::from_candidate(
            &candidate.clone().with_description("Nouvelle édition"),
            &other,
            EventType::Unknown,
            later,
        )
        .apply_to(&mut record);

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, first);
        assert_eq!(record.last_scraped_at, later);
        assert_eq!(record.updated_at, later);
        assert!(!record.is_visible);
        assert_eq!(record.sector, "Other");
        assert_eq!(record.event_type, "unknown");
        assert_eq!(record.description.as_deref(), Some("Nouvelle édition"));
    }
}
