//! The identity contract between the auth layer and the cloud session.
//!
//! The cloud session never performs a login itself; it asks a
//! [`CredentialProvider`] for the current identity at the moment it
//! needs one. `None` means anonymous; frames are still valid on the
//! wire, the remote service just won't treat them as authoritative.

/// The authenticated identity a session connects with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The session cookie value (`scratchsessionsid`).
    pub session_id: String,
    /// The username the identity belongs to.
    pub username: String,
}

/// Supplies the current authenticated identity, or `None` if anonymous.
pub trait CredentialProvider: Send + Sync {
    /// Current identity. Called at connect time and on every outbound
    /// `set`, so providers can rotate identity between calls.
    fn credentials(&self) -> Option<Credentials>;
}

/// A provider returning a fixed identity, for tokens obtained out of
/// band and for tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    /// Build a static provider from a session id and username.
    pub fn new(session_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self(Credentials {
            session_id: session_id.into(),
            username: username.into(),
        })
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.0.clone())
    }
}

/// A provider that is always anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn credentials(&self) -> Option<Credentials> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
