//! Candidate events as emitted by harvesters, before classification.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An unpersisted, normalized event listing produced by a harvester.
///
/// `end_date` is never earlier than `start_date`: every constructor and
/// setter collapses an inverted range onto the start date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub venue_name: String,
    pub city: String,
    pub address: String,
    /// Canonical listing URL, also the dedup key
    pub website: String,
    pub organizer: Option<String>,
    pub estimated_visitors: Option<u32>,
    pub estimated_exhibitors: Option<u32>,
    pub entry_fee: Option<String>,
    pub image_url: Option<String>,
    /// Identifier of the harvester that produced this candidate
    pub source: String,
}

impl CandidateEvent {
    /// Create a single-day candidate with empty venue fields.
    pub fn new(
        title: impl Into<String>,
        start_date: NaiveDate,
        website: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_date,
            end_date: start_date,
            venue_name: String::new(),
            city: String::new(),
            address: String::new(),
            website: website.into(),
            organizer: None,
            estimated_visitors: None,
            estimated_exhibitors: None,
            entry_fee: None,
            image_url: None,
            source: source.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    /// Set the end date; `None` or an end before the start collapses to the start.
    pub fn with_end_date(mut self, end_date: Option<NaiveDate>) -> Self {
        self.end_date = match end_date {
            Some(end) if end >= self.start_date => end,
            _ => self.start_date,
        };
        self
    }

    pub fn with_venue(
        mut self,
        venue_name: impl Into<String>,
        city: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.venue_name = venue_name.into();
        self.city = city.into();
        self.address = address.into();
        self
    }

    pub fn with_organizer(mut self, organizer: impl Into<String>) -> Self {
        self.organizer = Some(organizer.into());
        self
    }

    pub fn with_estimates(mut self, visitors: Option<u32>, exhibitors: Option<u32>) -> Self {
        self.estimated_visitors = visitors;
        self.estimated_exhibitors = exhibitors;
        self
    }

    pub fn with_entry_fee(mut self, entry_fee: impl Into<String>) -> Self {
        self.entry_fee = Some(entry_fee.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Re-establish the date ordering invariant after direct field writes.
    pub fn normalized(mut self) -> Self {
        if self.end_date < self.start_date {
            self.end_date = self.start_date;
        }
        self
    }

    /// Number of days covered, inclusive.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_end_defaults_to_start() {
        let event = CandidateEvent::new("Salon", date(2025, 3, 12), "https://a.fr/e", "test");
        assert_eq!(event.end_date, event.start_date);
        assert_eq!(event.duration_days(), 1);
    }

    #[test]
    fn test_inverted_end_collapses_to_start() {
        let event = CandidateEvent::new("Salon", date(2025, 3, 12), "https://a.fr/e", "test")
            .with_end_date(Some(date(2025, 3, 1)));
        assert_eq!(event.end_date, date(2025, 3, 12));

        let event = CandidateEvent::new("Salon", date(2025, 3, 12), "https://a.fr/e", "test")
            .with_end_date(Some(date(2025, 3, 15)));
        assert_eq!(event.end_date, date(2025, 3, 15));
        assert_eq!(event.duration_days(), 4);
    }

    #[test]
    fn test_normalized_repairs_direct_writes() {
        let mut event = CandidateEvent::new("Salon", date(2025, 3, 12), "https://a.fr/e", "test");
        event.end_date = date(2024, 1, 1);
        assert_eq!(event.normalized().end_date, date(2025, 3, 12));
    }

    #[test]
    fn test_blank_description_is_none() {
        let event = CandidateEvent::new("Salon", date(2025, 3, 12), "https://a.fr/e", "test")
            .with_description("   ");
        assert!(event.description.is_none());
    }
}
