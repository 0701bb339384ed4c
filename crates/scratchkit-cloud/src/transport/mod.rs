//! The transport seam: a bidirectional text-frame connection.
//!
//! The session owns exactly one transport for its lifetime and talks to
//! it through [`CloudTransport`]; [`CloudConnector`] is the opener that
//! turns an endpoint plus an authorization pair into a connected
//! transport. The seam exists so tests can drive a session over an
//! in-memory transport; production uses [`ws::WsConnector`].

use async_trait::async_trait;
use thiserror::Error;

pub mod ws;

/// The authorization pair the opener attaches to the connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectAuth {
    /// `Cookie` header value, absent for anonymous connections.
    pub cookie: Option<String>,
    /// `Origin` header value.
    pub origin: String,
}

/// A connected, message-oriented text transport.
#[async_trait]
pub trait CloudTransport: Send {
    /// Send one already-framed text message.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text chunk. `None` means the peer closed the
    /// connection cleanly; `Some(Err(_))` means the connection is lost.
    /// Control frames are acknowledged internally and never surfaced.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Further calls are allowed and harmless.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports. One opener can serve many sessions; each call
/// yields a transport owned exclusively by one session.
#[async_trait]
pub trait CloudConnector: Send + Sync {
    /// Open a connection to `endpoint` carrying the given authorization.
    async fn connect(
        &self,
        endpoint: &str,
        auth: &ConnectAuth,
    ) -> Result<Box<dyn CloudTransport>, TransportError>;
}

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connect failed: {reason}")]
    Connect {
        /// What went wrong while opening.
        reason: String,
    },

    /// A send did not complete.
    #[error("send failed: {reason}")]
    Send {
        /// What went wrong while sending.
        reason: String,
    },

    /// The connection errored while receiving.
    #[error("connection lost: {reason}")]
    Receive {
        /// What went wrong while receiving.
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TransportError::Connect {
            reason: "dns failure".to_string(),
        };
        assert_eq!(err.to_string(), "connect failed: dns failure");
    }

    #[test]
    fn default_auth_is_anonymous() {
        let auth = ConnectAuth::default();
        assert!(auth.cookie.is_none());
    }
}
