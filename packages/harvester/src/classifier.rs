//! Keyword classifier: professional-vs-leisure score, sector and tags.
//!
//! Leisure hits weigh twice as much as professional hits, so a listing with
//! mixed vocabulary leans towards "not professional". Keywords are matched as
//! whole words (plural/feminine suffixes allowed), case- and accent-insensitive.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HarvestError, Result};
use crate::normalize::fold_accents;
use crate::types::candidate::CandidateEvent;
use crate::types::classification::{ClassificationResult, DEFAULT_SECTOR};

const NEUTRAL_SCORE: f64 = 0.5;
const STRONG_INDICATOR_BONUS: f64 = 0.3;
const DAMPING: f64 = 0.3;
const LEISURE_WEIGHT: f64 = 2.0;
const SECTOR_CONFIDENCE_BONUS: f64 = 0.1;

/// `is_professional` holds exactly when the rounded score reaches this.
pub const PROFESSIONAL_THRESHOLD: f64 = 0.6;
pub const MAX_TAGS: usize = 5;

/// Suffixes tolerated after a keyword ("salon" matches "salons").
const WORD_SUFFIXES: &[&str] = &["es", "s", "x", "e", ""];

/// Keyword tables driving the classifier.
///
/// Order is significant: tags follow `professional` order and sector ties
/// resolve to the earliest sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCatalogue {
    pub professional: Vec<String>,
    pub strong_professional: Vec<String>,
    pub leisure: Vec<String>,
    pub sectors: IndexMap<String, Vec<String>>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordCatalogue {
    fn default() -> Self {
        let mut sectors = IndexMap::new();
        sectors.insert(
            "Technologie".to_string(),
            words(&[
                "technologie", "numérique", "digital", "informatique", "logiciel",
                "cybersécurité", "intelligence artificielle", "data", "cloud", "innovation", "tech",
            ]),
        );
        sectors.insert(
            "Industrie".to_string(),
            words(&[
                "industrie", "industriel", "industrielle", "usine", "manufacturing", "mécanique",
                "robotique", "automatisation", "sous-traitance", "plasturgie", "métallurgie",
            ]),
        );
        sectors.insert(
            "Santé".to_string(),
            words(&["santé", "médical", "pharma", "pharmaceutique", "hôpital", "biotech", "dentaire"]),
        );
        sectors.insert(
            "Agroalimentaire".to_string(),
            words(&[
                "agroalimentaire", "alimentaire", "agriculture", "agricole", "élevage", "food",
                "restauration", "boulangerie", "vins", "viticole",
            ]),
        );
        sectors.insert(
            "BTP".to_string(),
            words(&["btp", "bâtiment", "construction", "architecture", "immobilier", "travaux publics"]),
        );
        sectors.insert(
            "Énergie & Environnement".to_string(),
            words(&[
                "énergie", "environnement", "recyclage", "solaire", "éolien", "hydrogène",
                "développement durable",
            ]),
        );
        sectors.insert(
            "Transport & Logistique".to_string(),
            words(&[
                "logistique", "transport", "supply chain", "mobilité", "automobile", "aéronautique",
                "ferroviaire",
            ]),
        );
        sectors.insert(
            "Mode & Textile".to_string(),
            words(&["mode", "textile", "prêt-à-porter", "habillement", "luxe", "cosmétique", "beauté"]),
        );
        sectors.insert(
            "Tourisme".to_string(),
            words(&["tourisme", "hôtellerie", "voyage", "mice", "événementiel"]),
        );

        Self {
            professional: words(&[
                "b2b", "professionnel", "salon", "exposant", "congrès", "conférence", "convention",
                "forum", "business", "innovation", "industrie", "technologie",
                "rencontres d'affaires", "networking", "entreprise", "filière", "trade show",
                "expo", "symposium", "sommet", "décideur", "acheteur", "fournisseur",
                "distributeur",
            ]),
            strong_professional: words(&[
                "b2b", "professionnel", "réservé aux professionnels", "trade show",
                "business to business",
            ]),
            leisure: words(&[
                "concert", "festival", "spectacle", "jazz", "théâtre", "cinéma", "humour",
                "loisir", "famille", "enfant", "brocante", "vide-grenier", "marché de noël",
                "fête", "soirée", "grand public", "cirque",
            ]),
            sectors,
        }
    }
}

impl KeywordCatalogue {
    pub fn from_json(json: &str) -> Result<Self> {
        let catalogue: Self = serde_json::from_str(json)?;
        if catalogue.professional.is_empty() && catalogue.sectors.is_empty() {
            return Err(HarvestError::Config(
                "keyword catalogue has no professional keywords and no sectors".to_string(),
            ));
        }
        Ok(catalogue)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Keyword paired with its folded form for matching.
#[derive(Debug, Clone)]
struct Keyword {
    label: String,
    folded: String,
}

impl Keyword {
    fn compile(list: &[String]) -> Vec<Keyword> {
        list.iter()
            .map(|label| Keyword {
                label: label.clone(),
                folded: fold_accents(label),
            })
            .filter(|k| !k.folded.trim().is_empty())
            .collect()
    }
}

/// Whole-word containment over folded text, tolerating plural/feminine endings.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(idx, _)| {
        let starts_word = text[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        if !starts_word {
            return false;
        }
        let rest = &text[idx + keyword.len()..];
        WORD_SUFFIXES.iter().any(|suffix| {
            rest.strip_prefix(suffix).map_or(false, |after| {
                after.chars().next().map_or(true, |c| !c.is_alphanumeric())
            })
        })
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Keyword-catalogue classifier. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Classifier {
    professional: Vec<Keyword>,
    strong_professional: Vec<Keyword>,
    leisure: Vec<Keyword>,
    sectors: Vec<(String, Vec<Keyword>)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(KeywordCatalogue::default())
    }
}

impl Classifier {
    pub fn new(catalogue: KeywordCatalogue) -> Self {
        Self {
            professional: Keyword::compile(&catalogue.professional),
            strong_professional: Keyword::compile(&catalogue.strong_professional),
            leisure: Keyword::compile(&catalogue.leisure),
            sectors: catalogue
                .sectors
                .iter()
                .map(|(sector, keywords)| (sector.clone(), Keyword::compile(keywords)))
                .collect(),
        }
    }

    pub fn classify_candidate(&self, candidate: &CandidateEvent) -> ClassificationResult {
        self.classify(&candidate.title, candidate.description.as_deref())
    }

    pub fn classify(&self, title: &str, description: Option<&str>) -> ClassificationResult {
        let text = fold_accents(&format!("{} {}", title, description.unwrap_or("")));

        let professional_score = self.professional_score(&text);
        let sector = self.detect_sector(&text);
        let tags = self.extract_tags(&text);
        let is_professional = professional_score >= PROFESSIONAL_THRESHOLD;

        let mut result = ClassificationResult {
            is_professional,
            professional_score,
            sector,
            tags,
            confidence: 0.0,
        };

        let mut confidence = NEUTRAL_SCORE + (professional_score - NEUTRAL_SCORE).abs();
        if result.has_sector() {
            confidence += SECTOR_CONFIDENCE_BONUS;
        }
        result.confidence = round2(confidence.min(1.0));
        result
    }

    fn count_hits(keywords: &[Keyword], text: &str) -> usize {
        keywords
            .iter()
            .filter(|k| contains_keyword(text, &k.folded))
            .count()
    }

    /// Score in [0, 1], rounded to two decimals. Expects folded text.
    fn professional_score(&self, text: &str) -> f64 {
        let mut score = NEUTRAL_SCORE;

        let strong = self
            .strong_professional
            .iter()
            .any(|k| contains_keyword(text, &k.folded));

        if strong {
            score += STRONG_INDICATOR_BONUS;
        } else {
            let professional = Self::count_hits(&self.professional, text) as f64;
            let leisure = Self::count_hits(&self.leisure, text) as f64;
            let total = professional + leisure;
            if total > 0.0 {
                score += DAMPING * (professional - LEISURE_WEIGHT * leisure) / total;
            }
        }

        round2(score.clamp(0.0, 1.0))
    }

    /// Sector with the most keyword hits; the first sector wins ties.
    fn detect_sector(&self, text: &str) -> String {
        let mut best: Option<(&str, usize)> = None;
        for (sector, keywords) in &self.sectors {
            let hits = Self::count_hits(keywords, text);
            if hits > 0 && best.map_or(true, |(_, max)| hits > max) {
                best = Some((sector.as_str(), hits));
            }
        }
        best.map_or_else(|| DEFAULT_SECTOR.to_string(), |(sector, _)| sector.to_string())
    }

    fn extract_tags(&self, text: &str) -> Vec<String> {
        self.professional
            .iter()
            .filter(|k| contains_keyword(text, &k.folded))
            .map(|k| k.label.clone())
            .take(MAX_TAGS)
            .collect()
    }
}
