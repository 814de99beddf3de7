//! HTTP fetch client
//!
//! This module handles all HTTP requests made while mirroring and validating:
//! - Building HTTP clients with proper user agent strings and mandatory timeouts
//! - GET requests with redirect following
//! - Retries driven by an injected [`RetryPolicy`]
//! - Classification of the final failure as transient or permanent

use crate::config::{Config, FetchConfig, UserAgentConfig};
use crate::mirror::backoff::{AttemptFailure, RetryDecision, RetryPolicy};
use crate::FetchError;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// The URL that was requested
    pub url: Url,
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Raw body
    pub body: Vec<u8>,
    /// Attempts it took, the successful one included
    pub attempts: u32,
}

impl FetchedResource {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Formats the user agent string
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `fetch` - Timeouts for every request made with the client
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::{FetchConfig, UserAgentConfig};
/// use sumi_mirror::mirror::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiMirror".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, &FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(user_agent))
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP GET with bounded retries
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds the client used by the mirror orchestrator
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, &config.fetch)?;
        Ok(Self::new(client, RetryPolicy::from_config(&config.fetch)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | Listed status (default 429, 5xx) | Retry with backoff, then `Permanent` |
    /// | Other non-2xx | Immediate `Permanent` |
    /// | Timeout, refused, reset, truncated body | Retry with backoff, then `Transient` |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedResource)` - The origin answered 2xx
    /// * `Err(FetchError)` - The failure left after the retry policy gave up
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        self.fetch_with_referer(url, None).await
    }

    /// Fetches a URL, sending `referer` as the Referer header
    pub async fn fetch_with_referer(
        &self,
        url: &Url,
        referer: Option<&Url>,
    ) -> Result<FetchedResource, FetchError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let failure = match self.attempt(url, referer).await {
                Ok(mut resource) => {
                    resource.attempts = attempts;
                    debug!("Fetched {} in {} attempt(s)", url, attempts);
                    return Ok(resource);
                }
                Err(failure) => failure,
            };

            match self.policy.decide(attempts, &failure) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempts,
                        self.policy.max_attempts(),
                        url,
                        describe(&failure),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(match failure {
                        AttemptFailure::Network(reason) => FetchError::Transient {
                            url: url.to_string(),
                            attempts,
                            reason,
                        },
                        AttemptFailure::Status(status) => FetchError::Permanent {
                            url: url.to_string(),
                            status,
                            attempts,
                        },
                    });
                }
            }
        }
    }

    /// Makes one request
    async fn attempt(
        &self,
        url: &Url,
        referer: Option<&Url>,
    ) -> Result<FetchedResource, AttemptFailure> {
        let mut request = self.client.get(url.clone());
        if let Some(referer) = referer {
            request = request.header(REFERER, referer.as_str());
        }

        let response = request.send().await.map_err(classify_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(classify_error)?;

        Ok(FetchedResource {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
            attempts: 0,
        })
    }
}

/// Classifies a client error into a retryable network failure
fn classify_error(error: reqwest::Error) -> AttemptFailure {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("redirect error: {}", error)
    } else {
        error.to_string()
    };
    AttemptFailure::Network(reason)
}

fn describe(failure: &AttemptFailure) -> String {
    match failure {
        AttemptFailure::Network(reason) => reason.clone(),
        AttemptFailure::Status(status) => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestMirror".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), &FetchConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        assert_eq!(
            format_user_agent(&create_test_config()),
            "TestMirror/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_describe_failure() {
        assert_eq!(describe(&AttemptFailure::Status(503)), "HTTP 503");
        assert_eq!(
            describe(&AttemptFailure::Network("request timeout".into())),
            "request timeout"
        );
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_transient() {
        // Nothing listens on port 9 of the loopback interface
        let client = FetchClient::new(
            build_http_client(&create_test_config(), &FetchConfig::default()).unwrap(),
            RetryPolicy::no_retries(),
        );
        let url = Url::parse("http://127.0.0.1:9/page.html").unwrap();

        let err = client.fetch(&url).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.status(), None);
    }
}
