//! Error types for fieldlink-core.
//!
//! # Error Classification
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Http`] | Retry | Connection refused, reset or timed out |
//! | [`Error::HttpStatus`] | Retry | Non-2xx answer from the endpoint |
//! | [`Error::InvalidBody`] | Retry | Truncated or non-JSON body |
//! | [`Error::Timeout`] | Retry | Request phase exceeded its budget |
//! | [`Error::Decode`] | Do not retry | JSON body does not match the expected shape |
//! | [`Error::MutationRejected`] | Do not retry | Server refused to create the entity |
//! | [`Error::WebSocket`] | Do not retry | Subscription socket failed |
//! | [`Error::Protocol`] | Do not retry | Peer broke the subscription protocol |
//! | [`Error::AckTimeout`] | Do not retry | No `connection_ack` in time |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! GraphQL error lists inside an otherwise successful response are not
//! errors at this level: they are returned to the caller as part of
//! [`GraphqlResponse`](crate::GraphqlResponse).

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the transport and subscription clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Network-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status.
        status: StatusCode,
        /// Response body, truncated.
        body: String,
    },

    /// The response body is not a JSON document.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// The JSON response does not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A mutation returned no created entity.
    #[error("{operation} returned no result{}", describe_errors(errors))]
    MutationRejected {
        /// Name of the rejected operation.
        operation: String,
        /// GraphQL error messages returned alongside, if any.
        errors: Vec<String>,
    },

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Subscription protocol violation.
    #[error("Subscription protocol error: {0}")]
    Protocol(String),

    /// The server never acknowledged `connection_init`.
    #[error("No connection_ack received within {0:?}")]
    AckTimeout(Duration),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder(),
            Error::HttpStatus { .. } => true,
            Error::InvalidBody(_) => true,
            Error::Timeout { .. } => true,
            Error::Decode(_) => false,
            Error::MutationRejected { .. } => false,
            Error::WebSocket(_) => false,
            Error::Protocol(_) => false,
            Error::AckTimeout(_) => false,
            Error::InvalidConfig(_) => false,
        }
    }
}

fn describe_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}

/// Result type alias using fieldlink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
