//! Retrying page fetcher shared by every harvester.
//!
//! - Uses reqwest with a browser-like User-Agent and French Accept-Language
//! - Retries non-success statuses and transport errors with exponential backoff
//! - Gives up with [`FetchError::Exhausted`] once the attempt budget is spent

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};

/// Network access seam; harvesters only ever see this trait.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a document body as text.
    async fn fetch(&self, url: &str) -> FetchResult<String>;
}

/// HTTP fetcher with bounded exponential-backoff retry.
pub struct RetryingFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl RetryingFetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn fetch_once(&self, url: &str) -> FetchResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// Fetch with an explicit attempt budget.
    pub async fn fetch_with_retries(&self, url: &str, max_retries: u32) -> FetchResult<String> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let attempts = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            debug!(url = %url, attempt = attempt + 1, max_attempts = attempts, "Fetching page");
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        let delay = self.config.backoff(attempt);
                        warn!(
                            url = %url,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Fetch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(url = %url, attempts = attempts, error = %last_error, "Fetch retries exhausted");
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }
}

#[async_trait]
impl PageFetcher for RetryingFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.fetch_with_retries(url, self.config.max_retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_retries: u32) -> FetchConfig {
        FetchConfig::default()
            .with_max_retries(max_retries)
            .with_base_delay_ms(1)
            .with_timeout_secs(5)
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agenda"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agenda"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = RetryingFetcher::new(fast_config(3)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/agenda", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = RetryingFetcher::new(fast_config(3)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/agenda", server.uri()))
            .await
            .unwrap_err();

        match err {
            FetchError::Exhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("500"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_regex("user-agent", "Mozilla/5.0"))
            .and(header_regex("accept-language", "fr-FR"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RetryingFetcher::new(fast_config(1)).unwrap();
        assert_eq!(fetcher.fetch(&server.uri()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retried() {
        let fetcher = RetryingFetcher::new(fast_config(3)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
