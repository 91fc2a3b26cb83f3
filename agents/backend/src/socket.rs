//! WebSocket relay between the agent's webhooks and connected browsers.
//! Browsers subscribe per connection id; a webhook for that id is fanned
//! out as a [`SocketMessage`] envelope to every subscribed client.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::extract::ws::{Message, WebSocket};
use confirmd_flow::channel::{
    ClientCommand, SocketMessage, ENDPOINT_CONNECTIONS, ENDPOINT_ISSUE_CREDENTIAL,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

/// Subscribed clients keyed by the connection id they watch. A client that
/// re-subscribes is also registered under the new key; entries whose socket
/// is gone are pruned on the next `publish` for their key.
#[derive(Clone, Debug, Default)]
pub struct SocketRegistry {
    clients: Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<SocketMessage>>>>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, connection_id: &str, tx: mpsc::UnboundedSender<SocketMessage>) {
        let mut clients = self.clients.lock().unwrap();
        clients
            .entry(connection_id.to_string())
            .or_default()
            .push(tx);
    }

    /// Deliver a message to everyone watching its connection id. Messages
    /// without a connection id go to every client; senders whose socket is
    /// gone are dropped along the way.
    pub fn publish(&self, msg: &SocketMessage) {
        let mut clients = self.clients.lock().unwrap();
        match msg.connection_id.as_deref() {
            Some(id) => {
                if let Some(subscribers) = clients.get_mut(id) {
                    subscribers.retain(|tx| tx.send(msg.clone()).is_ok());
                    if subscribers.is_empty() {
                        clients.remove(id);
                    }
                }
            }
            None => {
                for subscribers in clients.values_mut() {
                    subscribers.retain(|tx| tx.send(msg.clone()).is_ok());
                }
                clients.retain(|_, subscribers| !subscribers.is_empty());
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, connection_id: &str) -> usize {
        self.clients
            .lock()
            .unwrap()
            .get(connection_id)
            .map_or(0, Vec::len)
    }
}

/// Drive one accepted WebSocket until either side hangs up. Inbound frames
/// carry subscribe commands; outbound frames are relayed webhook envelopes.
pub async fn handle_socket(socket: WebSocket, registry: SocketRegistry) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SocketMessage>();

    let forward = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(raw) = serde_json::to_string(&msg) else {
                continue;
            };
            if sink.send(Message::Text(raw)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(raw) => match serde_json::from_str::<ClientCommand>(&raw) {
                Ok(ClientCommand::Subscribe { connection_id }) => {
                    debug!("Socket client subscribes to {}", connection_id);
                    registry.subscribe(&connection_id, tx.clone());
                }
                Err(err) => debug!("Ignoring unknown socket frame: {}", err),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Dropping tx ends the forward task; registry entries are pruned on the
    // next publish.
    drop(tx);
    let _ = forward.await;
}

/// Translate one agent webhook into the envelope pushed to browsers. Only
/// the two topics browsers act on are relayed; everything else, and any
/// webhook without a `state` field, yields nothing.
pub fn webhook_to_message(topic: &str, body: &Value) -> Option<SocketMessage> {
    if topic != ENDPOINT_CONNECTIONS && topic != ENDPOINT_ISSUE_CREDENTIAL {
        debug!("Dropping webhook for unhandled topic {}", topic);
        return None;
    }
    let state = body.get("state").and_then(Value::as_str)?;
    let connection_id = body.get("connection_id").and_then(Value::as_str);
    Some(SocketMessage::new(topic, state, connection_id))
}
