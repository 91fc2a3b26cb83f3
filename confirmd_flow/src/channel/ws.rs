use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use super::{ChannelStatus, ClientCommand, EventChannel, SocketMessage};
use crate::errors::error::{FlowError, FlowErrorKind, FlowResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// WebSocket implementation of [`EventChannel`]. A background reader task
/// parses incoming text frames into [`SocketMessage`]s; dropping or closing
/// the channel aborts the reader so no stale updates are dispatched after
/// the owning view is gone.
#[derive(Debug)]
pub struct WsEventChannel {
    sink: WsSink,
    rx: mpsc::UnboundedReceiver<SocketMessage>,
    reader: JoinHandle<()>,
    status: Arc<Mutex<ChannelStatus>>,
}

impl WsEventChannel {
    pub async fn connect(url: &Url) -> FlowResult<Self> {
        info!("WsEventChannel::connect >>> url: {}", url);
        let status = Arc::new(Mutex::new(ChannelStatus::Connecting));

        let (stream, _) = connect_async(url.as_str()).await.map_err(|err| {
            *status.lock().unwrap() = ChannelStatus::Error;
            FlowError::from_msg(
                FlowErrorKind::ChannelClosed,
                format!("Cannot open event channel at {url}: {err}"),
            )
        })?;
        let (sink, mut source) = stream.split();

        *status.lock().unwrap() = ChannelStatus::Connected;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader_status = Arc::clone(&status);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(raw)) => {
                        if let Some(msg) = SocketMessage::parse(&raw) {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        *reader_status.lock().unwrap() = ChannelStatus::Disconnected;
                        break;
                    }
                    // Pings are answered by the transport; nothing else is
                    // expected on this channel.
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Event channel transport error: {}", err);
                        *reader_status.lock().unwrap() = ChannelStatus::Error;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            sink,
            rx,
            reader,
            status,
        })
    }
}

#[async_trait]
impl EventChannel for WsEventChannel {
    async fn subscribe(&mut self, connection_id: &str) -> FlowResult<()> {
        trace!("WsEventChannel::subscribe >>> connection_id: {}", connection_id);
        let cmd = ClientCommand::Subscribe {
            connection_id: connection_id.to_string(),
        };
        self.sink
            .send(Message::Text(serde_json::to_string(&cmd)?))
            .await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<SocketMessage> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        self.reader.abort();
        self.rx.close();
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
    }

    fn status(&self) -> ChannelStatus {
        *self.status.lock().unwrap()
    }
}

impl Drop for WsEventChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
