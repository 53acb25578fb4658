//! Websocket transport for push channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{StreamConnector, StreamEvent, ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};
use crate::error::TransportError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered events per connection.
const EVENT_BUFFER: usize = 64;

/// Connects push channels over websockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<StreamEvent>, TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        debug!("websocket connected");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump(socket, tx));
        Ok(rx)
    }
}

/// Forward socket frames to `tx` until either side goes away.
async fn pump(socket: Socket, tx: mpsc::Sender<StreamEvent>) {
    let (mut sink, mut stream) = socket.split();

    let code = loop {
        tokio::select! {
            _ = tx.closed() => {
                trace!("websocket: receiver dropped, closing");
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(StreamEvent::Message(text)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| u16::from(f.code)).unwrap_or(NO_STATUS_RECEIVED);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    let error = Arc::new(TransportError::WebSocket(e));
                    if tx.send(StreamEvent::Error(error)).await.is_err() {
                        return;
                    }
                    break ABNORMAL_CLOSURE;
                }
                None => break ABNORMAL_CLOSURE,
            }
        }
    };

    debug!(code, "websocket closed");
    let _ = tx.send(StreamEvent::Closed(code)).await;
}
