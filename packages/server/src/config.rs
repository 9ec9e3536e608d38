use anyhow::{Context, Result};
use dotenvy::dotenv;
use harvester::{ExecutionMode, FetchConfig, HarvestConfig};
use std::env;
use std::str::FromStr;

/// Every day at 03:00 (seconds-first cron syntax)
pub const DEFAULT_HARVEST_SCHEDULE: &str = "0 0 3 * * *";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub harvest_schedule: String,
    pub harvest: HarvestConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or(&lookup, "PORT", 8080)?,
            harvest_schedule: lookup("HARVEST_SCHEDULE")
                .unwrap_or_else(|| DEFAULT_HARVEST_SCHEDULE.to_string()),
            harvest: harvest_config(&lookup)?,
        })
    }
}

fn harvest_config<F>(lookup: &F) -> Result<HarvestConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = HarvestConfig::default();
    let fetch_defaults = FetchConfig::default();

    let mode = if flag(lookup, "HARVEST_CONCURRENT")? {
        ExecutionMode::Concurrent
    } else {
        ExecutionMode::Sequential
    };

    let fetch = FetchConfig::default()
        .with_max_retries(parse_or(lookup, "FETCH_MAX_RETRIES", fetch_defaults.max_retries)?)
        .with_base_delay_ms(parse_or(lookup, "FETCH_BASE_DELAY_MS", fetch_defaults.base_delay_ms)?)
        .with_timeout_secs(parse_or(lookup, "FETCH_TIMEOUT_SECS", fetch_defaults.timeout_secs)?);

    let mut config = HarvestConfig::new()
        .with_fallback_data(flag(lookup, "HARVEST_ALLOW_FALLBACK")?)
        .with_execution_mode(mode)
        .with_source_pause_ms(parse_or(lookup, "HARVEST_SOURCE_PAUSE_MS", defaults.source_pause_ms)?)
        .with_request_delay_ms(
            parse_or(lookup, "HARVEST_REQUEST_DELAY_MIN_MS", defaults.request_delay_min_ms)?,
            parse_or(lookup, "HARVEST_REQUEST_DELAY_MAX_MS", defaults.request_delay_max_ms)?,
        )
        .with_fetch(fetch);

    if let Some(path) = lookup("KEYWORD_CATALOGUE_PATH").filter(|p| !p.trim().is_empty()) {
        config = config.with_keyword_catalogue(path);
    }
    Ok(config)
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

fn flag<F>(lookup: &F, name: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => Ok(false),
        Some(v) => anyhow::bail!("{} must be a boolean, got {:?}", name, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/harvest")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.harvest_schedule, DEFAULT_HARVEST_SCHEDULE);
        assert!(!config.harvest.allow_fallback_data);
        assert_eq!(config.harvest.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.harvest.source_pause_ms, 2000);
        assert_eq!(config.harvest.fetch.max_retries, 3);
        assert!(config.harvest.keyword_catalogue_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/harvest"),
            ("PORT", "9000"),
            ("HARVEST_SCHEDULE", "0 30 2 * * MON"),
            ("HARVEST_ALLOW_FALLBACK", "true"),
            ("HARVEST_CONCURRENT", "1"),
            ("HARVEST_SOURCE_PAUSE_MS", "0"),
            ("HARVEST_REQUEST_DELAY_MIN_MS", "200"),
            ("HARVEST_REQUEST_DELAY_MAX_MS", "400"),
            ("FETCH_MAX_RETRIES", "5"),
            ("FETCH_TIMEOUT_SECS", "10"),
            ("KEYWORD_CATALOGUE_PATH", "/etc/harvest/keywords.json"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.harvest_schedule, "0 30 2 * * MON");
        assert!(config.harvest.allow_fallback_data);
        assert_eq!(config.harvest.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.harvest.source_pause_ms, 0);
        assert_eq!(config.harvest.request_delay_min_ms, 200);
        assert_eq!(config.harvest.request_delay_max_ms, 400);
        assert_eq!(config.harvest.fetch.max_retries, 5);
        assert_eq!(config.harvest.fetch.timeout_secs, 10);
        assert_eq!(
            config.harvest.keyword_catalogue_path.as_deref(),
            Some(std::path::Path::new("/etc/harvest/keywords.json"))
        );
    }

    #[test]
    fn test_missing_database_url() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_err!(config(&[("DATABASE_URL", "x"), ("PORT", "eighty")]));
        assert_err!(config(&[("DATABASE_URL", "x"), ("HARVEST_ALLOW_FALLBACK", "maybe")]));
        assert_ok!(config(&[("DATABASE_URL", "x"), ("HARVEST_ALLOW_FALLBACK", "no")]));
    }
}
