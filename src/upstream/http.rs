use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use super::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::error::UpstreamError;

/// Statuses retried with backoff, alongside connect and timeout failures.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// GET-only JSON client with retry/backoff and the response disk cache in
/// front of it.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    cache: Arc<ResponseCache>,
    max_retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ServerConfig, cache: Arc<ResponseCache>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("f1-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            client,
            cache,
            max_retries: config.http_max_retries,
            backoff: config.http_backoff,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// GET `base` with `query` appended and decode the body as JSON.
    pub async fn get_json(&self, base: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let mut url = Url::parse(base).map_err(|e| UpstreamError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let key = url.as_str().to_string();

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(url = %key, "cache hit");
            return Ok(cached);
        }

        let body = self.get_with_retry(url).await?;

        if let Err(e) = self.cache.put(&key, &body).await {
            tracing::warn!(url = %key, error = %e, "cannot write cache entry");
        }

        Ok(body)
    }

    async fn get_with_retry(&self, url: Url) -> Result<Value, UpstreamError> {
        let mut attempt = 0u32;

        loop {
            tracing::debug!(url = %url, attempt, "GET");

            match self.client.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await.map_err(|source| UpstreamError::Transport {
                            url: url.to_string(),
                            source,
                        })?;
                        return serde_json::from_slice(&bytes).map_err(|source| {
                            UpstreamError::Decode {
                                url: url.to_string(),
                                source,
                            }
                        });
                    }

                    if !is_retryable_status(status) || attempt >= self.max_retries {
                        return Err(UpstreamError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    tracing::warn!(url = %url, status = status.as_u16(), attempt, "retrying after error status");
                }
                Err(source) => {
                    let transient = source.is_connect() || source.is_timeout();
                    if !transient || attempt >= self.max_retries {
                        return Err(UpstreamError::Transport {
                            url: url.to_string(),
                            source,
                        });
                    }
                    tracing::warn!(url = %url, error = %source, attempt, "retrying after transport error");
                }
            }

            attempt += 1;
            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// Delay before retry number `attempt` (1-based): `factor * 2^(attempt-1)`.
fn backoff_delay(factor: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    factor.saturating_mul(1u32 << exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let factor = Duration::from_millis(500);
        assert_eq!(backoff_delay(factor, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(factor, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(factor, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
