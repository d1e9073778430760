//! Line codec for event envelopes.
//!
//! An envelope is `{"type": ..., "db": ..., "data": {...}}`. Decoding is
//! two-staged: the envelope is parsed first, then `data` is resolved
//! against the declared type.

use crate::error::{ProtocolError, ProtocolResult};
use crate::event::{Event, EventData, EventType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    db: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<&'a str>,
    data: &'a EventData,
}

/// Decodes a single record into a typed [`Event`].
///
/// A trailing `\n` or `\r\n` is ignored. The `db` field is kept only for
/// `tx` events.
///
/// # Errors
///
/// - [`ProtocolError::Json`] if the record is not a well-formed envelope
/// - [`ProtocolError::UnknownEventType`] if `type` is not a known variant
/// - [`ProtocolError::Payload`] if `data` does not fit the declared type
pub fn decode_line(line: &[u8]) -> ProtocolResult<Event> {
    let raw: RawEnvelope = serde_json::from_slice(trim_line_end(line)).map_err(ProtocolError::Json)?;

    let event_type = raw.event_type.parse::<EventType>()?;
    let payload_err = |source| ProtocolError::Payload { event_type, source };

    let (db, data) = match event_type {
        EventType::Init => (
            None,
            EventData::Init(serde_json::from_value(raw.data).map_err(payload_err)?),
        ),
        EventType::PrimaryChange => (
            None,
            EventData::PrimaryChange(serde_json::from_value(raw.data).map_err(payload_err)?),
        ),
        EventType::Tx => (
            raw.db.filter(|db| !db.is_empty()),
            EventData::Tx(serde_json::from_value(raw.data).map_err(payload_err)?),
        ),
    };

    Ok(Event { db, data })
}

/// Encodes an event as a single `\n`-terminated JSON line.
pub fn encode_line(event: &Event) -> ProtocolResult<Vec<u8>> {
    let envelope = EnvelopeRef {
        event_type: event.event_type().as_str(),
        db: event.db.as_deref(),
        data: &event.data,
    };
    let mut line = serde_json::to_vec(&envelope).map_err(ProtocolError::Json)?;
    line.push(b'\n');
    Ok(line)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
