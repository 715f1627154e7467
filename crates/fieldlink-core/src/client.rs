//! HTTP transport for GraphQL queries and mutations.
//!
//! # Example
//!
//! ```no_run
//! use fieldlink_core::{ClientConfig, GraphqlClient};
//!
//! # async fn example() -> Result<(), fieldlink_core::Error> {
//! let config = ClientConfig::new("https://api.example.com/graphql", "wss://api.example.com/graphql")
//!     .with_tokens("token-id", "token-value");
//! let client = GraphqlClient::new(&config)?;
//!
//! let devices = client.devices(100, 0).await?;
//! println!("{} devices, {} errors", devices.value.len(), devices.errors.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use fieldlink_types::{CreatedEvent, Detection, Device, EventInput, Track};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::operations::{
    CreateEvent, CreateEventVariables, DetectionQuery, DeviceDetail, DeviceVariables,
    DevicesVariables, GetDetections, GetDevice, GetDevices, GetTracks, GraphqlOperation,
    GraphqlResponse, Introspection, IntrospectionData, QueryResult, TrackFilter,
};
use crate::retry::{RetryConfig, with_retry};

/// Credential header carrying the token id.
pub const TOKEN_ID_HEADER: &str = "x-token-id";
/// Credential header carrying the token value.
pub const TOKEN_VALUE_HEADER: &str = "x-token-value";

/// Longest error body kept in [`Error::HttpStatus`].
const MAX_ERROR_BODY: usize = 512;

/// GraphQL client over HTTP POST.
///
/// Holds one `reqwest` session with the credential headers and request
/// timeout applied to every request. The session is released on drop.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: Client,
    api_url: String,
    request_timeout: Duration,
    retry: RetryConfig,
}

impl GraphqlClient {
    /// Create a client from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(TOKEN_ID_HEADER),
            header_value(TOKEN_ID_HEADER, &config.token_id)?,
        );
        headers.insert(
            HeaderName::from_static(TOKEN_VALUE_HEADER),
            header_value(TOKEN_VALUE_HEADER, &config.token_value)?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            request_timeout: config.request_timeout,
            retry: config.retry.clone(),
        })
    }

    /// The endpoint requests are posted to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Execute a document and return the raw response.
    ///
    /// Transport failures are retried per the configured [`RetryConfig`].
    /// GraphQL errors are returned inside the response and logged, never
    /// retried.
    pub async fn execute(
        &self,
        document: &str,
        variables: Option<&Value>,
    ) -> Result<GraphqlResponse<Value>> {
        let body = request_body(document, variables);
        let response = with_retry(&self.retry, "GraphQL request", || self.post(&body)).await?;

        if let Some(first) = response.errors.first() {
            warn!(
                "GraphQL returned {} error(s), first: {}",
                response.errors.len(),
                first
            );
        }
        Ok(response)
    }

    /// Execute a typed operation.
    pub async fn execute_operation<O: GraphqlOperation>(
        &self,
        variables: &O::Variables,
    ) -> Result<GraphqlResponse<O::Data>> {
        debug!("Executing {}", O::NAME);
        let variables = serde_json::to_value(variables)?;
        let response = self.execute(O::DOCUMENT, Some(&variables)).await?;

        let data = match response.data {
            Some(Value::Null) | None => None,
            Some(data) => Some(serde_json::from_value::<O::Data>(data)?),
        };
        Ok(GraphqlResponse {
            data,
            errors: response.errors,
        })
    }

    /// Introspect the remote schema.
    pub async fn introspect(&self) -> Result<QueryResult<IntrospectionData>> {
        let response = self.execute_operation::<Introspection>(&()).await?;
        Ok(QueryResult::from_response(response, |data| data))
    }

    /// List devices.
    pub async fn devices(&self, limit: u32, offset: u32) -> Result<QueryResult<Vec<Device>>> {
        let variables = DevicesVariables {
            limit: Some(limit),
            offset: Some(offset),
        };
        let response = self.execute_operation::<GetDevices>(&variables).await?;
        Ok(QueryResult::from_response(response, |data| data.devices))
    }

    /// Fetch one device with its tracks and recent detections.
    pub async fn device(&self, device_id: &str) -> Result<QueryResult<Option<DeviceDetail>>> {
        let variables = DeviceVariables {
            device_id: device_id.to_string(),
        };
        let response = self.execute_operation::<GetDevice>(&variables).await?;
        Ok(QueryResult::from_response(response, |data| data.device))
    }

    /// List tracks matching a filter.
    pub async fn tracks(&self, filter: &TrackFilter) -> Result<QueryResult<Vec<Track>>> {
        let response = self.execute_operation::<GetTracks>(filter).await?;
        Ok(QueryResult::from_response(response, |data| data.tracks))
    }

    /// List detections matching a query.
    pub async fn detections(&self, query: &DetectionQuery) -> Result<QueryResult<Vec<Detection>>> {
        let response = self.execute_operation::<GetDetections>(query).await?;
        Ok(QueryResult::from_response(response, |data| data.detections))
    }

    /// Create an event.
    ///
    /// A response without a created event is [`Error::MutationRejected`],
    /// carrying whatever error messages the server returned.
    pub async fn create_event(&self, input: &EventInput) -> Result<CreatedEvent> {
        let variables = CreateEventVariables {
            input: input.clone(),
        };
        let response = self.execute_operation::<CreateEvent>(&variables).await?;
        let errors = response.error_messages();

        match response.data.and_then(|data| data.create_event) {
            Some(event) => Ok(event),
            None => Err(Error::MutationRejected {
                operation: CreateEvent::NAME.to_string(),
                errors,
            }),
        }
    }

    /// One attempt: POST, check status, decode the envelope.
    async fn post(&self, body: &Value) -> Result<GraphqlResponse<Value>> {
        let response = self
            .http
            .post(&self.api_url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status,
                body: truncate(&String::from_utf8_lossy(&bytes), MAX_ERROR_BODY),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidBody(e.to_string()))
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                operation: "GraphQL request".to_string(),
                duration: self.request_timeout,
            }
        } else {
            Error::Http(error)
        }
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidConfig(format!("{name} is not a valid header value")))
}

/// Build `{query, variables?}`; `variables` is left out when empty.
fn request_body(document: &str, variables: Option<&Value>) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), Value::String(document.to_string()));
    if let Some(variables) = variables.filter(|v| !is_empty_variables(v)) {
        body.insert("variables".to_string(), variables.clone());
    }
    Value::Object(body)
}

fn is_empty_variables(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
