use serde::{Deserialize, Serialize};

/// Sector assigned when no catalogue keyword matches.
pub const DEFAULT_SECTOR: &str = "Other";

/// Outcome of the keyword classifier for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_professional: bool,
    /// 0.0 (leisure) to 1.0 (professional), two decimals
    pub professional_score: f64,
    pub sector: String,
    pub tags: Vec<String>,
    /// Derived from the score's distance to neutral and the sector match
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn has_sector(&self) -> bool {
        self.sector != DEFAULT_SECTOR
    }
}

/// Coarse event-type label from the pattern rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    TradeFair,
    Convention,
    Congress,
    Conference,
    Ceremony,
    Leisure,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TradeFair => "trade-fair",
            EventType::Convention => "convention",
            EventType::Congress => "congress",
            EventType::Conference => "conference",
            EventType::Ceremony => "ceremony",
            EventType::Leisure => "leisure",
            EventType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trade-fair" => Ok(EventType::TradeFair),
            "convention" => Ok(EventType::Convention),
            "congress" => Ok(EventType::Congress),
            "conference" => Ok(EventType::Conference),
            "ceremony" => Ok(EventType::Ceremony),
            "leisure" => Ok(EventType::Leisure),
            "unknown" => Ok(EventType::Unknown),
            _ => Err(format!("Invalid event type: {}", s)),
        }
    }
}
