//! Auth error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSRF endpoint answered without a token cookie.
    #[error("no CSRF token in response")]
    CsrfMissing,

    /// The login endpoint rejected the credentials.
    #[error("login rejected: {message}")]
    LoginRejected {
        /// The server's reason.
        message: String,
    },

    /// A response was missing a field the flow depends on.
    #[error("malformed response: {context}")]
    MalformedResponse {
        /// What was missing.
        context: &'static str,
    },

    /// The operation requires a prior login.
    #[error("not logged in")]
    NotLoggedIn,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_rejected_display() {
        let err = AuthError::LoginRejected {
            message: "Incorrect username or password.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "login rejected: Incorrect username or password."
        );
    }

    #[test]
    fn malformed_response_display() {
        let err = AuthError::MalformedResponse {
            context: "empty login response",
        };
        assert!(err.to_string().contains("empty login response"));
    }
}
