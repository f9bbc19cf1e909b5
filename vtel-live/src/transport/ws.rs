//! WebSocket client for the frame stream

use super::{StreamConnection, StreamEvent, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsConnection {
    socket: Socket,
}

impl WsConnection {
    pub async fn open(url: &str) -> Result<Self, TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| classify_handshake_error(url, e))?;
        debug!(url, status = %response.status(), "WebSocket handshake complete");
        Ok(Self { socket })
    }
}

fn classify_handshake_error(url: &str, error: WsError) -> TransportError {
    match error {
        WsError::Url(e) => TransportError::Protocol(format!("invalid url {}: {}", url, e)),
        WsError::HttpFormat(e) => TransportError::Protocol(format!("invalid url {}: {}", url, e)),
        WsError::Http(response) if response.status().is_client_error() => {
            TransportError::Protocol(format!("{} answered {}", url, response.status()))
        }
        other => TransportError::Connect(other.to_string()),
    }
}

/// Only a normal-closure close frame (or a bare close) counts as clean
fn is_clean_close(code: Option<CloseCode>) -> bool {
    matches!(code, None | Some(CloseCode::Normal))
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn next_event(&mut self) -> StreamEvent {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return StreamEvent::Text(text),
                Some(Ok(Message::Binary(bytes))) => return StreamEvent::Binary(bytes),
                Some(Ok(Message::Close(frame))) => {
                    return StreamEvent::Closed {
                        clean: is_clean_close(frame.map(|f| f.code)),
                    }
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed)) => return StreamEvent::Closed { clean: true },
                Some(Err(e)) => return StreamEvent::Failed(TransportError::Interrupted(e.to_string())),
                // Stream ended without a close frame
                None => return StreamEvent::Closed { clean: false },
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}
