//! Event-type labelling from ordered pattern families.
//!
//! Families are checked in a fixed order and the first with any match wins,
//! so "Congrès et salon" is a trade fair. Text is accent-folded first; the
//! patterns are written without diacritics.

use lazy_static::lazy_static;
use regex::Regex;

use crate::normalize::fold_accents;
use crate::types::candidate::CandidateEvent;
use crate::types::classification::EventType;

fn family(event_type: EventType, patterns: &[&str]) -> (EventType, Vec<Regex>) {
    let compiled = patterns
        .iter()
        .map(|p| Regex::new(&format!(r"(?i)\b(?:{})\b", p)).unwrap())
        .collect();
    (event_type, compiled)
}

lazy_static! {
    static ref FAMILIES: Vec<(EventType, Vec<Regex>)> = vec![
        family(
            EventType::TradeFair,
            &[r"salons?", r"foires?", r"expos?", r"expositions?", r"trade ?shows?", r"trade ?fairs?", r"biennales?"],
        ),
        family(EventType::Convention, &[r"conventions?", r"rencontres? d'affaires", r"assises"]),
        family(EventType::Congress, &[r"congres", r"congress(?:es)?", r"symposiums?", r"symposia"]),
        family(
            EventType::Conference,
            &[r"conferences?", r"colloques?", r"seminaires?", r"seminars?", r"sommets?", r"summits?", r"forums?", r"webinaires?", r"journees? techniques?"],
        ),
        family(
            EventType::Ceremony,
            &[r"ceremonies?", r"remises? des? prix", r"trophees?", r"awards?", r"galas?", r"inaugurations?"],
        ),
        family(
            EventType::Leisure,
            &[r"concerts?", r"festivals?", r"spectacles?", r"theatre", r"cinema", r"brocantes?", r"vide-greniers?", r"marches? de noel", r"fetes?", r"soirees?", r"cirques?", r"jazz"],
        ),
    ];
}

/// Assigns an [`EventType`] to listings. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeRuleEngine;

impl TypeRuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, title: &str, description: Option<&str>) -> EventType {
        let text = fold_accents(&format!("{} {}", title, description.unwrap_or("")));
        FAMILIES
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&text)))
            .map_or(EventType::Unknown, |(event_type, _)| *event_type)
    }

    pub fn detect_candidate(&self, candidate: &CandidateEvent) -> EventType {
        self.detect(&candidate.title, candidate.description.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        let engine = TypeRuleEngine::new();
        assert_eq!(engine.detect("Salon de l'Agriculture", None), EventType::TradeFair);
        assert_eq!(engine.detect("Foire de Paris", None), EventType::TradeFair);
        assert_eq!(engine.detect("Convention annuelle des franchisés", None), EventType::Convention);
        assert_eq!(engine.detect("Congrès national des notaires", None), EventType::Congress);
        assert_eq!(engine.detect("Conférence IA générative", None), EventType::Conference);
        assert_eq!(engine.detect("Cérémonie des Trophées de l'Export", None), EventType::Ceremony);
        assert_eq!(engine.detect("Concert de jazz", None), EventType::Leisure);
        assert_eq!(engine.detect("Journée portes ouvertes", None), EventType::Unknown);
    }

    #[test]
    fn test_first_family_wins() {
        let engine = TypeRuleEngine::new();
        assert_eq!(
            engine.detect("Congrès de cardiologie", Some("avec salon des exposants")),
            EventType::TradeFair
        );
        assert_eq!(engine.detect("Forum et festival", None), EventType::Conference);
    }

    #[test]
    fn test_whole_words_only() {
        let engine = TypeRuleEngine::new();
        // "exposure" and "salonnard" must not read as trade fairs
        assert_eq!(engine.detect("Exposure therapy", None), EventType::Unknown);
        assert_eq!(engine.detect("Un salonnard", None), EventType::Unknown);
    }

    #[test]
    fn test_description_counts() {
        let engine = TypeRuleEngine::new();
        assert_eq!(
            engine.detect("Global Industrie", Some("Le salon de l'industrie")),
            EventType::TradeFair
        );
    }
}
