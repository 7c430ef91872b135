//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the New Relic APIs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// NerdGraph base URL, such as `https://api.newrelic.com`.
    pub api_base_url: Url,
    /// User API key sent with NerdGraph requests.
    pub api_key: String,
    /// Event ingest base URL, such as `https://insights-collector.newrelic.com`.
    pub insights_base_url: Url,
    /// Ingest license key sent with event posts.
    pub insights_api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration from raw URLs and keys.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if a URL does not parse or a key
    /// is empty.
    pub fn new(
        api_base_url: &str,
        api_key: impl Into<String>,
        insights_base_url: &str,
        insights_api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let insights_api_key = insights_api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::InvalidConfig {
                reason: "api key must not be empty".to_string(),
            });
        }
        if insights_api_key.trim().is_empty() {
            return Err(ClientError::InvalidConfig {
                reason: "insights collector api key must not be empty".to_string(),
            });
        }

        Ok(Self {
            api_base_url: parse_base_url("api base url", api_base_url)?,
            api_key,
            insights_base_url: parse_base_url(
                "insights collector api base url",
                insights_base_url,
            )?,
            insights_api_key,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of the NerdGraph endpoint.
    #[must_use]
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", trimmed(&self.api_base_url))
    }

    /// URL of the event ingest endpoint for one account.
    #[must_use]
    pub fn events_url(&self, account_id: i64) -> String {
        format!("{}/v1/accounts/{account_id}/events", trimmed(&self.insights_base_url))
    }
}

fn parse_base_url(name: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidConfig {
        reason: format!("{name} '{raw}' is invalid: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidConfig {
            reason: format!("{name} '{raw}' must use http or https"),
        });
    }
    Ok(url)
}

fn trimmed(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}
