//! Local cache of variable name → value.
//!
//! The session's read loop is the only writer; callers read from
//! arbitrary tasks, so the map sits behind a lock. Values only ever
//! come from accepted `set` events. The protocol has no delete, so the
//! store never shrinks.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::codec::SetEvent;

/// The authoritative local snapshot of cloud-variable state.
#[derive(Debug, Default)]
pub struct VariableStore {
    vars: RwLock<HashMap<String, String>>,
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an accepted `set` event, unconditionally overwriting the
    /// mapped value (last writer wins; the protocol has no versioning).
    pub fn apply(&self, event: &SetEvent) {
        let _ = self
            .vars
            .write()
            .insert(event.name.clone(), event.value.clone());
    }

    /// Current value of a variable, or `None` if it has never been
    /// observed in this session.
    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }

    /// A copy of the full mapping, safe to iterate while the session
    /// keeps applying events.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.vars.read().clone()
    }

    /// Number of variables observed so far.
    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    /// Whether no variable has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.vars.read().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
