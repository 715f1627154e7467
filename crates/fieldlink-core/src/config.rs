//! Client configuration shared by the HTTP and WebSocket transports.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Default GraphQL HTTP endpoint.
pub const DEFAULT_API_URL: &str = "http://localhost:4000/graphql";

/// Default GraphQL WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:4000/graphql";

/// Default total timeout for one HTTP attempt or WebSocket connect.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time to wait for `connection_ack`.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints, credentials and timing for [`GraphqlClient`](crate::GraphqlClient)
/// and [`SubscriptionClient`](crate::SubscriptionClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP(S) endpoint for queries and mutations.
    pub api_url: String,
    /// WS(S) endpoint for subscriptions.
    pub ws_url: String,
    /// Sent as `x-token-id`.
    pub token_id: String,
    /// Sent as `x-token-value`.
    pub token_value: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub ack_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            token_id: String::new(),
            token_value: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryConfig::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given endpoints with default timing.
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// Set both credential tokens.
    #[must_use]
    pub fn with_tokens(mut self, token_id: impl Into<String>, token_value: impl Into<String>) -> Self {
        self.token_id = token_id.into();
        self.token_value = token_value.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Check endpoint schemes and timeouts.
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api_url
            )));
        }
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "WebSocket URL must start with ws:// or wss://, got: {}",
                self.ws_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.ack_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "ack timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_schemes() {
        let config = ClientConfig::new("ftp://example.com", "ws://example.com");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ClientConfig::new("https://example.com", "https://example.com");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ClientConfig::new("https://example.com/graphql", "wss://example.com/graphql")
            .with_tokens("id", "secret");
        assert!(config.validate().is_ok());
        assert_eq!(config.token_id, "id");
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = ClientConfig::default().with_ack_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
