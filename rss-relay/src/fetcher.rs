use crate::types::{FetchConfig, RelayError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        // Some registries (ClinicalTrials.gov among them) reject requests that
        // do not look like a browser.
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/rss+xml, application/atom+xml, application/xml, text/xml, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    /// Downloads a feed body, retrying network errors, 429 and 5xx responses
    /// with exponential backoff. Other HTTP errors fail immediately.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let retry_delay = Duration::from_secs(self.config.retry_delay_seconds);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: retry_delay,
            initial_interval: retry_delay,
            max_interval: retry_delay * 16,
            multiplier: 2.0,
            // Attempts are bounded by max_retries instead.
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            let error = match self.fetch_once(url).await {
                Ok(body) => {
                    info!(
                        "Fetched {} ({} bytes in {} ms)",
                        url,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => e,
            };

            if attempt >= self.config.max_retries {
                return Err(error);
            }
            attempt += 1;
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!("Attempt {} failed for {}: {}; retrying in {:?}", attempt, url, error, delay);
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let limit_bytes = self.config.max_feed_size_mb.saturating_mul(1024 * 1024);
        let too_large = || RelayError::FeedTooLarge {
            limit_mb: self.config.max_feed_size_mb,
        };

        // Chunked and decompressed bodies carry no length, so the cap is
        // also enforced while reading.
        if response.content_length().is_some_and(|len| len > limit_bytes as u64) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn is_retryable(error: &RelayError) -> bool {
    match error {
        RelayError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        RelayError::HttpStatus { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}
