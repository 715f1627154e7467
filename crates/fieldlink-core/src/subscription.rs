//! GraphQL subscriptions over WebSocket (`graphql-transport-ws`).
//!
//! A subscription moves through a fixed sequence of states:
//!
//! ```text
//! Connecting -> AwaitingAck -> Subscribed -> Streaming -> Terminated
//! ```
//!
//! [`SubscriptionClient::subscribe`] performs the first three steps (socket
//! connect, `connection_init`/`connection_ack` handshake, `subscribe`) and
//! returns a [`Subscription`] that reads messages lazily as the caller asks
//! for items. No `subscribe` message is ever sent before the server's
//! `connection_ack`. A terminated subscription cannot be restarted; open a
//! new one instead.
//!
//! # Example
//!
//! ```no_run
//! use fieldlink_core::{ClientConfig, SubscriptionClient};
//! use fieldlink_types::DetectionFilter;
//!
//! # async fn example() -> Result<(), fieldlink_core::Error> {
//! let client = SubscriptionClient::new(&ClientConfig::default())?;
//! let subscription = client
//!     .detections(&DetectionFilter::new().min_confidence(0.7))
//!     .await?;
//!
//! let handled = subscription
//!     .for_each_item(|detection| async move {
//!         println!("{} {:?}", detection.id, detection.confidence);
//!     })
//!     .await?;
//! println!("handled {handled} detections");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use futures::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use fieldlink_types::{Detection, DetectionFilter};

use crate::client::{TOKEN_ID_HEADER, TOKEN_VALUE_HEADER};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::operations::{DETECTION_CREATED_FIELD, GraphqlError, SUB_DETECTIONS};

/// WebSocket subprotocol spoken by the server.
pub const SUBPROTOCOL: &str = "graphql-transport-ws";

/// Operation id used for the detection feed.
pub const DEFAULT_OPERATION_ID: &str = "1";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one subscription connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Opening the socket.
    Connecting,
    /// `connection_init` sent, waiting for `connection_ack`.
    AwaitingAck,
    /// `subscribe` sent, no result yet.
    Subscribed,
    /// At least one `next` received.
    Streaming,
    /// Finished; no further items.
    Terminated,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::AwaitingAck => "awaiting-ack",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Streaming => "streaming",
            SubscriptionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Protocol envelope: `{type, id?, payload?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProtocolMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl ProtocolMessage {
    fn new(message_type: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
            id: None,
            payload: None,
        }
    }

    fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    fn to_frame(&self) -> Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }

    /// Decode a data frame; control frames yield `None`.
    fn from_frame(frame: &Message) -> Option<std::result::Result<Self, serde_json::Error>> {
        match frame {
            Message::Text(text) => Some(serde_json::from_str(text.as_str())),
            Message::Binary(bytes) => Some(serde_json::from_slice(bytes)),
            _ => None,
        }
    }
}

/// Opens `graphql-transport-ws` subscriptions.
#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    config: ClientConfig,
}

impl SubscriptionClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Subscribe to live detections.
    ///
    /// Unset filter fields are omitted from the subscription variables.
    pub async fn detections(&self, filter: &DetectionFilter) -> Result<Subscription<Detection>> {
        let variables = serde_json::to_value(filter)?;
        info!(
            "Listening for detections (min_confidence={})",
            filter
                .min_confidence
                .map_or_else(|| "any".to_string(), |c| format!("{c:.2}"))
        );
        self.subscribe(
            DEFAULT_OPERATION_ID,
            SUB_DETECTIONS,
            DETECTION_CREATED_FIELD,
            variables,
        )
        .await
    }

    /// Open a connection, complete the handshake and start a subscription.
    ///
    /// Results are read from `payload.data.<field>` of each `next` message
    /// and decoded as `T`.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        operation_id: &str,
        document: &str,
        field: &str,
        variables: Value,
    ) -> Result<Subscription<T>> {
        debug!("Subscription state: {}", SubscriptionState::Connecting);
        let mut socket = self.connect().await?;

        debug!("Subscription state: {}", SubscriptionState::AwaitingAck);
        let init = ProtocolMessage::new("connection_init").with_payload(json!({
            TOKEN_ID_HEADER: self.config.token_id,
            TOKEN_VALUE_HEADER: self.config.token_value,
        }));
        socket.send(init.to_frame()?).await?;

        let ack_timeout = self.config.ack_timeout;
        timeout(ack_timeout, wait_for_ack(&mut socket))
            .await
            .map_err(|_| Error::AckTimeout(ack_timeout))??;

        let subscribe = ProtocolMessage::new("subscribe")
            .with_id(operation_id)
            .with_payload(json!({"query": document, "variables": variables}));
        socket.send(subscribe.to_frame()?).await?;
        debug!("Subscription state: {}", SubscriptionState::Subscribed);

        Ok(Subscription {
            socket: Some(socket),
            state: SubscriptionState::Subscribed,
            operation_id: operation_id.to_string(),
            field: field.to_string(),
            _item: PhantomData,
        })
    }

    async fn connect(&self) -> Result<Socket> {
        let mut request = self.config.ws_url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let connect_timeout = self.config.request_timeout;
        let (socket, _response) = timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| Error::Timeout {
                operation: "WebSocket connect".to_string(),
                duration: connect_timeout,
            })??;
        Ok(socket)
    }
}

/// Read until `connection_ack`, discarding anything else.
async fn wait_for_ack(socket: &mut Socket) -> Result<()> {
    while let Some(frame) = socket.next().await {
        let frame = frame?;
        if matches!(frame, Message::Close(_)) {
            break;
        }
        match ProtocolMessage::from_frame(&frame) {
            Some(Ok(message)) if message.message_type == "connection_ack" => return Ok(()),
            Some(Ok(message)) if message.message_type == "ping" => {
                socket.send(ProtocolMessage::new("pong").to_frame()?).await?;
            }
            Some(Ok(message)) => {
                debug!("Discarding {} before connection_ack", message.message_type);
            }
            Some(Err(e)) => debug!("Discarding undecodable message before connection_ack: {e}"),
            None => {}
        }
    }
    Err(Error::Protocol(
        "connection closed before connection_ack".to_string(),
    ))
}

/// An active subscription yielding decoded results of type `T`.
///
/// Dropping the subscription drops the socket.
pub struct Subscription<T> {
    socket: Option<Socket>,
    state: SubscriptionState,
    operation_id: String,
    field: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state)
            .field("operation_id", &self.operation_id)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> Subscription<T> {
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SubscriptionState::Terminated
    }

    /// Wait for the next result.
    ///
    /// Returns `Ok(None)` once the server sends `complete` or `error`, or
    /// closes the socket. A transport failure is returned once, after which
    /// the subscription is terminated. A result that fails to decode as `T`
    /// is returned as [`Error::Decode`] without ending the subscription.
    pub async fn next_item(&mut self) -> Result<Option<T>> {
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return Ok(None);
            };

            let frame = match socket.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.socket = None;
                    self.state = SubscriptionState::Terminated;
                    return Err(e.into());
                }
                None => {
                    debug!("Subscription socket closed by server");
                    self.socket = None;
                    self.state = SubscriptionState::Terminated;
                    return Ok(None);
                }
            };

            if matches!(frame, Message::Close(_)) {
                debug!("Subscription socket closed by server");
                self.socket = None;
                self.state = SubscriptionState::Terminated;
                return Ok(None);
            }

            let message = match ProtocolMessage::from_frame(&frame) {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!("Discarding undecodable subscription message: {e}");
                    continue;
                }
                None => continue,
            };

            if let Some(id) = message.id.as_deref()
                && id != self.operation_id
            {
                debug!("Ignoring {} for unknown operation {}", message.message_type, id);
                continue;
            }

            match message.message_type.as_str() {
                "next" => {
                    self.state = SubscriptionState::Streaming;
                    if let Some(item) = self.decode_next(message.payload)? {
                        return Ok(Some(item));
                    }
                }
                "error" => {
                    let payload = message.payload.unwrap_or(Value::Null);
                    warn!("Subscription {} failed: {}", self.operation_id, payload);
                    self.finish().await;
                    return Ok(None);
                }
                "complete" => {
                    info!("Subscription {} completed", self.operation_id);
                    self.finish().await;
                    return Ok(None);
                }
                "ping" => {
                    let mut pong = ProtocolMessage::new("pong");
                    pong.payload = message.payload;
                    if let Err(e) = socket.send(pong.to_frame()?).await {
                        self.socket = None;
                        self.state = SubscriptionState::Terminated;
                        return Err(e.into());
                    }
                }
                other => debug!("Ignoring subscription message of type {other}"),
            }
        }
    }

    /// Pull `payload.data.<field>` out of a `next` payload.
    fn decode_next(&self, payload: Option<Value>) -> Result<Option<T>> {
        let Some(Value::Object(mut payload)) = payload else {
            return Ok(None);
        };

        if let Some(errors) = payload.remove("errors") {
            match serde_json::from_value::<Vec<GraphqlError>>(errors.clone()) {
                Ok(errors) if !errors.is_empty() => warn!(
                    "Subscription {} returned {} error(s), first: {}",
                    self.operation_id,
                    errors.len(),
                    errors[0]
                ),
                Ok(_) => {}
                Err(_) => warn!("Subscription {} returned errors: {}", self.operation_id, errors),
            }
        }

        let item = match payload.remove("data") {
            Some(Value::Object(mut data)) => data.remove(&self.field),
            _ => None,
        };
        match item {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Run `handler` for every result until the subscription ends.
    ///
    /// The handler is awaited before the next message is read. A result
    /// that fails to decode is logged and skipped. Returns the number of
    /// results handled.
    pub async fn for_each_item<F, Fut>(mut self, mut handler: F) -> Result<usize>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut handled = 0;
        loop {
            match self.next_item().await {
                Ok(Some(item)) => {
                    handler(item).await;
                    handled += 1;
                }
                Ok(None) => return Ok(handled),
                Err(Error::Decode(e)) => {
                    warn!("Skipping undecodable result on {}: {}", self.operation_id, e);
                }
                Err(e) => {
                    self.close().await;
                    return Err(e);
                }
            }
        }
    }

    /// Turn the subscription into a lazy stream of results.
    ///
    /// The stream ends after `complete`, `error` or a transport failure.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures::stream::unfold(Some(self), |subscription| async move {
            let mut subscription = subscription?;
            match subscription.next_item().await {
                Ok(Some(item)) => Some((Ok(item), Some(subscription))),
                Ok(None) => None,
                Err(e) => {
                    let rest = (!subscription.is_terminated()).then_some(subscription);
                    Some((Err(e), rest))
                }
            }
        })
    }

    /// Stop the subscription and close the socket.
    ///
    /// Sends `complete` for the operation if it is still running. Best
    /// effort: send failures are ignored.
    pub async fn close(&mut self) {
        if let Some(socket) = self.socket.as_mut()
            && matches!(
                self.state,
                SubscriptionState::Subscribed | SubscriptionState::Streaming
            )
            && let Ok(frame) = ProtocolMessage::new("complete")
                .with_id(&self.operation_id)
                .to_frame()
        {
            let _ = socket.send(frame).await;
        }
        self.finish().await;
    }

    async fn finish(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.state = SubscriptionState::Terminated;
    }
}
