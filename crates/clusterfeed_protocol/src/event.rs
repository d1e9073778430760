//! Typed events and their payloads.

use crate::ids::{Checksum, TxId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminator of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Role and node identity announced at the start of a stream.
    Init,
    /// The cluster primary changed.
    PrimaryChange,
    /// A replicated write transaction.
    Tx,
}

impl EventType {
    /// All known event types.
    pub const ALL: [EventType; 3] = [EventType::Init, EventType::PrimaryChange, EventType::Tx];

    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Init => "init",
            EventType::PrimaryChange => "primaryChange",
            EventType::Tx => "tx",
        }
    }

    /// Looks up a type by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "init" => Some(EventType::Init),
            "primaryChange" => Some(EventType::PrimaryChange),
            "tx" => Some(EventType::Tx),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = crate::ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| crate::ProtocolError::UnknownEventType(s.to_string()))
    }
}

/// Payload of an `init` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitEventData {
    /// Whether the announcing node is the primary.
    pub is_primary: bool,
    /// Hostname of the current primary.
    pub hostname: String,
}

/// Payload of a `primaryChange` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryChangeEventData {
    /// Whether the local node is now the primary.
    pub is_primary: bool,
    /// Hostname of the new primary.
    pub hostname: String,
}

/// Payload of a `tx` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxEventData {
    /// Transaction identifier.
    #[serde(rename = "txID")]
    pub txid: TxId,
    /// Database checksum after the transaction was applied.
    pub post_apply_checksum: Checksum,
    /// Database page size in bytes.
    pub page_size: u32,
    /// Database size in pages at commit.
    pub commit: u32,
    /// Commit time. `None` when the record carried no timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Typed payload of an event. Exactly one variant per [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// `init` payload.
    Init(InitEventData),
    /// `primaryChange` payload.
    PrimaryChange(PrimaryChangeEventData),
    /// `tx` payload.
    Tx(TxEventData),
}

impl EventData {
    /// Returns the type that selects this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::Init(_) => EventType::Init,
            EventData::PrimaryChange(_) => EventType::PrimaryChange,
            EventData::Tx(_) => EventType::Tx,
        }
    }
}

/// A decoded event record.
///
/// The event type is derived from the payload variant, so the two can
/// never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Database name. Only set for `tx` events.
    pub db: Option<String>,
    /// Typed payload.
    pub data: EventData,
}

impl Event {
    /// Creates an `init` event.
    pub fn init(is_primary: bool, hostname: impl Into<String>) -> Self {
        Self {
            db: None,
            data: EventData::Init(InitEventData {
                is_primary,
                hostname: hostname.into(),
            }),
        }
    }

    /// Creates a `primaryChange` event.
    pub fn primary_change(is_primary: bool, hostname: impl Into<String>) -> Self {
        Self {
            db: None,
            data: EventData::PrimaryChange(PrimaryChangeEventData {
                is_primary,
                hostname: hostname.into(),
            }),
        }
    }

    /// Creates a `tx` event for the given database.
    pub fn tx(db: impl Into<String>, data: TxEventData) -> Self {
        Self {
            db: Some(db.into()),
            data: EventData::Tx(data),
        }
    }

    /// Returns the event type.
    pub fn event_type(&self) -> EventType {
        self.data.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        for ty in EventType::ALL {
            assert_eq!(EventType::from_wire(ty.as_str()), Some(ty));
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
        assert!("Init".parse::<EventType>().is_err());
    }

    #[test]
    fn event_type_follows_payload() {
        assert_eq!(Event::init(true, "node-1").event_type(), EventType::Init);
        assert_eq!(
            Event::primary_change(false, "node-2").event_type(),
            EventType::PrimaryChange
        );
    }

    #[test]
    fn tx_payload_field_names() {
        let data = TxEventData {
            txid: TxId::from(0x27),
            post_apply_checksum: Checksum::from(0x83b0_5248_774c_e767),
            page_size: 4096,
            commit: 2,
            timestamp: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["txID"], "0000000000000027");
        assert_eq!(json["postApplyChecksum"], "83b05248774ce767");
        assert_eq!(json["pageSize"], 4096);
        assert_eq!(json["commit"], 2);
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn zero_timestamp_is_not_absent() {
        let json = r#"{"txID":"0000000000000001","postApplyChecksum":"0000000000000000","pageSize":512,"commit":1,"timestamp":"0001-01-01T00:00:00Z"}"#;
        let data: TxEventData = serde_json::from_str(json).unwrap();
        let ts = data.timestamp.expect("zero timestamp should be present");
        assert_eq!(ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true), "0001-01-01T00:00:00Z");

        let json = r#"{"txID":"0000000000000001","postApplyChecksum":"0000000000000000","pageSize":512,"commit":1}"#;
        let data: TxEventData = serde_json::from_str(json).unwrap();
        assert!(data.timestamp.is_none());
    }
}
