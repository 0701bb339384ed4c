//! Workspace settings with environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. Apply `SCRATCHKIT_*` environment variable overrides
//!
//! Each env var has strict parsing rules; invalid values are silently
//! ignored (fall back to the default).

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level settings for the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Base URL of the main site (login, csrf, session endpoints).
    pub site_base: String,
    /// User-agent header sent on HTTP requests.
    pub user_agent: String,
    /// Cloud-variable session settings.
    pub cloud: CloudSettings,
}

/// Settings for the cloud-variable session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudSettings {
    /// WebSocket endpoint of the cloud-variable service.
    pub endpoint: String,
    /// `Origin` header value sent when opening the connection.
    pub origin: String,
    /// Deadline for the handshake and initial variable sync, in ms.
    pub handshake_timeout_ms: u64,
    /// Per-subscriber event buffer capacity.
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_base: "https://scratch.mit.edu".to_string(),
            user_agent: concat!("scratchkit/", env!("CARGO_PKG_VERSION")).to_string(),
            cloud: CloudSettings::default(),
        }
    }
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            endpoint: "wss://clouddata.scratch.mit.edu".to_string(),
            origin: "https://scratch.mit.edu".to_string(),
            handshake_timeout_ms: 10_000,
            event_buffer: 256,
        }
    }
}

impl Settings {
    /// Load settings: compiled defaults plus env var overrides.
    pub fn load() -> Self {
        let mut settings = Self::default();
        apply_env_overrides(&mut settings);
        settings
    }
}

/// Apply environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(v) = read_env_string("SCRATCHKIT_SITE_BASE") {
        settings.site_base = v;
    }
    if let Some(v) = read_env_string("SCRATCHKIT_USER_AGENT") {
        settings.user_agent = v;
    }
    if let Some(v) = read_env_string("SCRATCHKIT_CLOUD_URL") {
        settings.cloud.endpoint = v;
    }
    if let Some(v) = read_env_string("SCRATCHKIT_CLOUD_ORIGIN") {
        settings.cloud.origin = v;
    }
    if let Some(v) = read_env_u64("SCRATCHKIT_HANDSHAKE_TIMEOUT_MS", 1_000, 600_000) {
        settings.cloud.handshake_timeout_ms = v;
    }
    if let Some(v) = read_env_usize("SCRATCHKIT_EVENT_BUFFER", 1, 65_536) {
        settings.cloud.event_buffer = v;
    }
}

fn read_env_string(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    if value.is_empty() {
        return None;
    }
    debug!(name, "env override applied");
    Some(value)
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    parse_u64_in_range(&raw, min, max)
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    parse_usize_in_range(&raw, min, max)
}

fn parse_u64_in_range(raw: &str, min: u64, max: u64) -> Option<u64> {
    let value: u64 = raw.trim().parse().ok()?;
    (min..=max).contains(&value).then_some(value)
}

fn parse_usize_in_range(raw: &str, min: usize, max: usize) -> Option<usize> {
    let value: usize = raw.trim().parse().ok()?;
    (min..=max).contains(&value).then_some(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
