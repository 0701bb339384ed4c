//! Line-delimited JSON wire codec.
//!
//! Every protocol message is one JSON object per line. The server may
//! deliver several newline-terminated lines in a single chunk (the
//! initial sync batch always does), so decoding is per-line and one
//! malformed line never aborts its siblings. Encoding appends the
//! trailing newline itself; it is mandatory framing, not cosmetics.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A single decoded inbound protocol event, tagged by `method`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method")]
pub enum CloudEvent {
    /// A variable was set to a new value.
    #[serde(rename = "set")]
    Set(SetEvent),
    /// Any other method. Decodable for forward compatibility, carries
    /// nothing this client interprets.
    #[serde(other)]
    Unknown,
}

/// Payload of a `set` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetEvent {
    /// Variable name. Opaque: the leading cloud-glyph convention is
    /// neither stripped nor validated.
    pub name: String,
    /// The new value. The service emits both JSON strings and numbers;
    /// numbers are carried as their decimal rendering.
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    /// Project id echoed by the server. Not verified against the
    /// session's room.
    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub project_id: Option<String>,
}

/// An outbound frame, tagged by `method` like the inbound events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method")]
pub enum OutboundFrame {
    /// Joins the connection to a project and identifies the user. Sent
    /// exactly once, before any other frame.
    #[serde(rename = "handshake")]
    Handshake {
        /// The room, as a decimal string.
        project_id: String,
        /// Username, empty when anonymous.
        user: String,
    },
    /// Requests a variable change. The store only reflects it once the
    /// server echoes the corresponding `set` event back.
    #[serde(rename = "set")]
    Set {
        /// Variable name.
        name: String,
        /// The room, as a decimal string.
        project_id: String,
        /// Username, empty when anonymous.
        user: String,
        /// The requested value.
        value: String,
    },
}

impl OutboundFrame {
    /// Build a handshake frame for a room.
    pub fn handshake(room: u64, user: &str) -> Self {
        Self::Handshake {
            project_id: room.to_string(),
            user: user.to_string(),
        }
    }

    /// Build a set-request frame for a room.
    pub fn set(name: &str, room: u64, user: &str, value: &str) -> Self {
        Self::Set {
            name: name.to_string(),
            project_id: room.to_string(),
            user: user.to_string(),
            value: value.to_string(),
        }
    }

    /// Serialize to one newline-terminated wire line.
    pub fn encode(&self) -> String {
        // These shapes serialize infallibly.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// A single inbound line could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not valid JSON, or valid JSON without a usable `method` tag.
    #[error("invalid event line: {source}")]
    InvalidLine {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Decode one wire line into an event.
pub fn decode_line(line: &str) -> Result<CloudEvent, DecodeError> {
    Ok(serde_json::from_str(line)?)
}

/// Decode a delivered chunk: split on newlines and decode each line
/// independently. Blank segments (including the trailing one left by
/// the line terminator) produce nothing.
pub fn decode_chunk(chunk: &str) -> Vec<Result<CloudEvent, DecodeError>> {
    chunk
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(decode_line)
        .collect()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn string_or_number_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // ── decode_line ─────────────────────────────────────────────────

    #[test]
    fn decode_set_event() {
        let event =
            decode_line(r#"{"method":"set","name":"☁ score","value":"12","project_id":"604"}"#)
                .unwrap();
        assert_matches!(event, CloudEvent::Set(set) => {
            assert_eq!(set.name, "☁ score");
            assert_eq!(set.value, "12");
            assert_eq!(set.project_id.as_deref(), Some("604"));
        });
    }

    #[test]
    fn decode_numeric_value_and_project_id() {
        let event =
            decode_line(r#"{"method":"set","name":"☁ hi","value":42,"project_id":604}"#).unwrap();
        assert_matches!(event, CloudEvent::Set(set) => {
            assert_eq!(set.value, "42");
            assert_eq!(set.project_id.as_deref(), Some("604"));
        });
    }

    #[test]
    fn decode_unknown_method() {
        let event = decode_line(r#"{"method":"ack","project_id":"604"}"#).unwrap();
        assert_matches!(event, CloudEvent::Unknown);
    }

    #[test]
    fn decode_missing_method_is_error() {
        assert_matches!(
            decode_line(r#"{"name":"x","value":"1"}"#),
            Err(DecodeError::InvalidLine { .. })
        );
    }

    #[test]
    fn decode_invalid_json_is_error() {
        assert_matches!(decode_line("not json"), Err(DecodeError::InvalidLine { .. }));
    }

    // ── decode_chunk ────────────────────────────────────────────────

    #[test]
    fn chunk_splits_lines_and_ignores_trailing_newline() {
        let chunk = "{\"method\":\"set\",\"name\":\"a\",\"value\":\"1\"}\n{\"method\":\"set\",\"name\":\"b\",\"value\":\"2\"}\n";
        let events = decode_chunk(chunk);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
    }

    #[test]
    fn chunk_malformed_line_does_not_abort_siblings() {
        let chunk = "{\"method\":\"set\",\"name\":\"a\",\"value\":\"1\"}\ngarbage\n{\"method\":\"set\",\"name\":\"b\",\"value\":\"2\"}\n";
        let events = decode_chunk(chunk);
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
        assert!(events[2].is_ok());
    }

    #[test]
    fn empty_chunk_is_no_messages() {
        assert!(decode_chunk("").is_empty());
        assert!(decode_chunk("\n").is_empty());
        assert!(decode_chunk("\n\n").is_empty());
    }

    // ── encode ──────────────────────────────────────────────────────

    #[test]
    fn handshake_frame_shape() {
        let line = OutboundFrame::handshake(604_987_531, "gargron").encode();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["method"], "handshake");
        assert_eq!(value["project_id"], "604987531");
        assert_eq!(value["user"], "gargron");
    }

    #[test]
    fn set_frame_shape() {
        let line = OutboundFrame::set("☁ score", 604, "gargron", "12").encode();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["method"], "set");
        assert_eq!(value["name"], "☁ score");
        assert_eq!(value["project_id"], "604");
        assert_eq!(value["user"], "gargron");
        assert_eq!(value["value"], "12");
    }

    #[test]
    fn encode_then_decode_roundtrips() {
        let line = OutboundFrame::set("☁ x", 123, "me", "v").encode();
        let event = decode_line(line.trim_end()).unwrap();
        assert_matches!(event, CloudEvent::Set(set) => {
            assert_eq!(set.name, "☁ x");
            assert_eq!(set.value, "v");
            assert_eq!(set.project_id.as_deref(), Some("123"));
        });
    }
}
