//! Session error types.

use thiserror::Error;

use crate::codec::DecodeError;
use crate::session::SessionState;
use crate::transport::TransportError;

/// Errors surfaced by a cloud session.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The transport could not be opened or the handshake failed; the
    /// session never reached `synchronized`.
    #[error("connection failed: {reason}")]
    Connection {
        /// What went wrong while connecting.
        reason: String,
    },

    /// An inbound line could not be decoded. Recovered in the read loop
    /// (the line is skipped); surfaced only from codec entry points.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The connection closed or errored mid-session; the session is
    /// terminal.
    #[error("transport lost: {reason}")]
    TransportLost {
        /// Why the connection ended.
        reason: String,
    },

    /// The operation is not valid in the session's current state. The
    /// state is unchanged.
    #[error("{operation} is not valid while the session is {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// A deadline elapsed.
    #[error("timed out after {timeout_ms}ms: {context}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// What we were waiting for.
        context: &'static str,
    },

    /// The session's read loop is gone (closed concurrently).
    #[error("session closed")]
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
