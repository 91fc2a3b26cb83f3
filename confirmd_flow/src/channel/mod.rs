//! Push-event channel between the browser-equivalent client and the demo
//! backend. One channel per process; steps subscribe and unsubscribe against
//! the same underlying connection rather than opening new ones.

mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use self::ws::WsEventChannel;
use crate::errors::error::FlowResult;

/// Endpoint tag for connection lifecycle events.
pub const ENDPOINT_CONNECTIONS: &str = "connections";
/// Endpoint tag for credential-exchange lifecycle events.
pub const ENDPOINT_ISSUE_CREDENTIAL: &str = "issue_credential";

/// Envelope pushed by the backend whenever the external agent reports a
/// state change. `endpoint` identifies the subsystem, `state` the lifecycle
/// point within it; anything else rides along untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocketMessage {
    pub endpoint: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl SocketMessage {
    pub fn new(endpoint: &str, state: &str, connection_id: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            state: state.to_string(),
            connection_id: connection_id.map(str::to_string),
            payload: serde_json::Map::new(),
        }
    }

    /// Parse a raw frame. Frames missing `endpoint` or `state` are malformed
    /// (or heartbeats) and dropped with a log line only.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(raw) {
            Ok(msg) => Some(msg),
            Err(err) => {
                debug!("Dropping malformed socket message: {}", err);
                None
            }
        }
    }
}

/// Command frames the client sends upstream. Externally tagged, so
/// `Subscribe` serializes as `{"subscribe":{"connectionId":"..."}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ClientCommand {
    #[serde(rename = "subscribe", rename_all = "camelCase")]
    Subscribe { connection_id: String },
}

/// Transport status surfaced to the UI layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Contract of the push-event transport. The server multiplexes pushed
/// events per subscribed connection id, so `subscribe` must be re-issued
/// whenever the authoritative id changes; events emitted while unsubscribed
/// are not redelivered and get reconciled by polling.
#[async_trait]
pub trait EventChannel: Send {
    /// (Re-)subscribe to events for a connection id.
    async fn subscribe(&mut self, connection_id: &str) -> FlowResult<()>;

    /// Next pushed message, in arrival order. `None` means the channel is
    /// gone and the flow degrades to polling-only state discovery.
    async fn recv(&mut self) -> Option<SocketMessage>;

    /// Tear the channel down. No messages may be delivered afterwards.
    async fn close(&mut self);

    fn status(&self) -> ChannelStatus;
}

/// In-memory channel over an mpsc pair. Stands in for the real transport in
/// tests and wherever a polling-style injection point is enough.
#[derive(Debug)]
pub struct InMemoryEventChannel {
    rx: mpsc::UnboundedReceiver<SocketMessage>,
    subscribed: Option<String>,
    status: ChannelStatus,
}

impl InMemoryEventChannel {
    pub fn pair() -> (mpsc::UnboundedSender<SocketMessage>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                subscribed: None,
                status: ChannelStatus::Connected,
            },
        )
    }

    pub fn subscribed_connection(&self) -> Option<&str> {
        self.subscribed.as_deref()
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn subscribe(&mut self, connection_id: &str) -> FlowResult<()> {
        self.subscribed = Some(connection_id.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Option<SocketMessage> {
        if self.status != ChannelStatus::Connected {
            return None;
        }
        let msg = self.rx.recv().await;
        if msg.is_none() {
            self.status = ChannelStatus::Disconnected;
        }
        msg
    }

    async fn close(&mut self) {
        self.rx.close();
        self.status = ChannelStatus::Disconnected;
    }

    fn status(&self) -> ChannelStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_envelope() {
        let raw = r#"{"endpoint":"connections","state":"active","connection_id":"c1","extra":1}"#;
        let msg = SocketMessage::parse(raw).unwrap();
        assert_eq!(msg.endpoint, ENDPOINT_CONNECTIONS);
        assert_eq!(msg.state, "active");
        assert_eq!(msg.connection_id.as_deref(), Some("c1"));
        assert_eq!(msg.payload.get("extra"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn drops_message_without_endpoint_or_state() {
        assert!(SocketMessage::parse(r#"{"state":"active"}"#).is_none());
        assert!(SocketMessage::parse(r#"{"endpoint":"connections"}"#).is_none());
        assert!(SocketMessage::parse("not json").is_none());
    }

    #[test]
    fn subscribe_command_wire_shape() {
        let cmd = ClientCommand::Subscribe {
            connection_id: "c1".to_string(),
        };
        let raw = serde_json::to_string(&cmd).unwrap();
        assert_eq!(raw, r#"{"subscribe":{"connectionId":"c1"}}"#);
    }

    #[tokio::test]
    async fn in_memory_channel_delivers_in_arrival_order() {
        let (tx, mut channel) = InMemoryEventChannel::pair();
        channel.subscribe("c1").await.unwrap();
        tx.send(SocketMessage::new(ENDPOINT_CONNECTIONS, "request", Some("c1")))
            .unwrap();
        tx.send(SocketMessage::new(ENDPOINT_CONNECTIONS, "active", Some("c1")))
            .unwrap();

        assert_eq!(channel.recv().await.unwrap().state, "request");
        assert_eq!(channel.recv().await.unwrap().state, "active");
    }

    #[tokio::test]
    async fn closed_channel_delivers_nothing() {
        let (tx, mut channel) = InMemoryEventChannel::pair();
        tx.send(SocketMessage::new(ENDPOINT_CONNECTIONS, "active", Some("c1")))
            .unwrap();
        channel.close().await;
        assert_eq!(channel.status(), ChannelStatus::Disconnected);
        assert!(channel.recv().await.is_none());
    }
}
