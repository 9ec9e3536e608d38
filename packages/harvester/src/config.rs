use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like User-Agent; agenda pages routinely reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Network retrieval settings shared by every harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total attempts per URL before giving up
    pub max_retries: u32,
    /// Backoff base: attempt `n` waits `base_delay_ms * 2^n`
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Delay to wait after the given 0-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// How the orchestrator schedules harvesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One source after another with a pause in between
    Sequential,
    /// One worker per source; pacing still applies inside each source
    Concurrent,
}

/// Thresholds gating persistence of a classified candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionPolicy {
    /// Confidence must be strictly greater than this
    pub min_confidence: f64,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
        }
    }
}

/// Configuration for a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Substitute each source's example events when live retrieval yields nothing.
    ///
    /// Off by default: canned data hides a broken upstream.
    pub allow_fallback_data: bool,
    pub execution_mode: ExecutionMode,
    /// Pause between sources in sequential mode
    pub source_pause_ms: u64,
    /// Randomized pause between two pages of the same source
    pub request_delay_min_ms: u64,
    pub request_delay_max_ms: u64,
    pub admission: AdmissionPolicy,
    pub fetch: FetchConfig,
    /// Optional JSON file overriding the built-in keyword catalogue
    pub keyword_catalogue_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            allow_fallback_data: false,
            execution_mode: ExecutionMode::Sequential,
            source_pause_ms: 2000,
            request_delay_min_ms: 1000,
            request_delay_max_ms: 3000,
            admission: AdmissionPolicy::default(),
            fetch: FetchConfig::default(),
            keyword_catalogue_path: None,
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_data(mut self, allow: bool) -> Self {
        self.allow_fallback_data = allow;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_source_pause_ms(mut self, ms: u64) -> Self {
        self.source_pause_ms = ms;
        self
    }

    pub fn with_request_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.request_delay_min_ms = min;
        self.request_delay_max_ms = max;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.admission.min_confidence = min_confidence;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_keyword_catalogue(mut self, path: impl Into<PathBuf>) -> Self {
        self.keyword_catalogue_path = Some(path.into());
        self
    }

    /// Inter-request delay range in milliseconds (tolerates min > max).
    pub fn request_delay_range(&self) -> RangeInclusive<u64> {
        let min = self.request_delay_min_ms.min(self.request_delay_max_ms);
        let max = self.request_delay_min_ms.max(self.request_delay_max_ms);
        min..=max
    }

    /// Settings without any pauses or backoff (tests, one-off runs).
    pub fn immediate() -> Self {
        Self::default()
            .with_source_pause_ms(0)
            .with_request_delay_ms(0, 0)
            .with_fetch(FetchConfig::default().with_base_delay_ms(0))
    }
}
