//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, HeaderValue, ORIGIN};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::{CloudConnector, CloudTransport, ConnectAuth, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections with the session cookie and origin
/// attached to the upgrade request.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl CloudConnector for WsConnector {
    async fn connect(
        &self,
        endpoint: &str,
        auth: &ConnectAuth,
    ) -> Result<Box<dyn CloudTransport>, TransportError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| TransportError::Connect {
                reason: e.to_string(),
            })?;

        let headers = request.headers_mut();
        if let Some(cookie) = &auth.cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| TransportError::Connect {
                reason: format!("invalid cookie header: {e}"),
            })?;
            let _ = headers.insert(COOKIE, value);
        }
        let origin = HeaderValue::from_str(&auth.origin).map_err(|e| TransportError::Connect {
            reason: format!("invalid origin header: {e}"),
        })?;
        let _ = headers.insert(ORIGIN, origin);

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect {
                reason: e.to_string(),
            })?;
        debug!(endpoint, status = %response.status(), "websocket connected");

        Ok(Box::new(WsTransport { ws }))
    }
}

/// A connected WebSocket.
struct WsTransport {
    ws: WsStream,
}

#[async_trait]
impl CloudTransport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send {
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered inside tungstenite while the stream
                // is polled; pongs and binary frames carry nothing for us.
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(TransportError::Receive {
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.ws.close(None).await.map_err(|e| TransportError::Send {
            reason: e.to_string(),
        })
    }
}
