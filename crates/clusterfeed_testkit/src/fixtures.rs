//! Canonical wire records and their decoded events.

use chrono::{DateTime, Utc};
use clusterfeed_protocol::{Checksum, Event, TxEventData, TxId};

/// `init` record for a primary named `node-1`.
pub const INIT_EVENT_JSON: &str =
    r#"{"type":"init","data":{"isPrimary":true,"hostname":"node-1"}}"#;

/// `tx` record for database `db`.
pub const TX_EVENT_JSON: &str = r#"{"type":"tx","db":"db","data":{"txID":"0000000000000027","postApplyChecksum":"83b05248774ce767","pageSize":4096,"commit":2,"timestamp":"0001-01-01T00:00:00Z"}}"#;

/// `primaryChange` record: `node-2` became primary.
pub const PRIMARY_CHANGE_NODE2_JSON: &str =
    r#"{"type":"primaryChange","data":{"isPrimary":false,"hostname":"node-2"}}"#;

/// `primaryChange` record: this node, `node-1`, became primary.
pub const PRIMARY_CHANGE_NODE1_JSON: &str =
    r#"{"type":"primaryChange","data":{"isPrimary":true,"hostname":"node-1"}}"#;

/// A record that is not JSON at all.
pub const MALFORMED_JSON: &str = "beep boop";

/// A well-formed record with an unknown type.
pub const UNKNOWN_TYPE_JSON: &str = r#"{"type":"checkpoint","data":{}}"#;

/// Event decoded from [`INIT_EVENT_JSON`].
pub fn init_event() -> Event {
    Event::init(true, "node-1")
}

/// Event decoded from [`TX_EVENT_JSON`].
pub fn tx_event() -> Event {
    Event::tx(
        "db",
        TxEventData {
            txid: TxId::from(0x27),
            post_apply_checksum: Checksum::from(0x83b0_5248_774c_e767),
            page_size: 4096,
            commit: 2,
            timestamp: Some(zero_timestamp()),
        },
    )
}

/// Event decoded from [`PRIMARY_CHANGE_NODE2_JSON`].
pub fn primary_change_node2_event() -> Event {
    Event::primary_change(false, "node-2")
}

/// Event decoded from [`PRIMARY_CHANGE_NODE1_JSON`].
pub fn primary_change_node1_event() -> Event {
    Event::primary_change(true, "node-1")
}

/// The zero timestamp, `0001-01-01T00:00:00Z`.
pub fn zero_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("0001-01-01T00:00:00Z")
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterfeed_protocol::decode_line;

    #[test]
    fn fixtures_decode_to_their_events() {
        let cases = [
            (INIT_EVENT_JSON, init_event()),
            (TX_EVENT_JSON, tx_event()),
            (PRIMARY_CHANGE_NODE2_JSON, primary_change_node2_event()),
            (PRIMARY_CHANGE_NODE1_JSON, primary_change_node1_event()),
        ];
        for (line, expected) in cases {
            assert_eq!(decode_line(line.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn bad_fixtures_fail() {
        assert!(decode_line(MALFORMED_JSON.as_bytes()).is_err());
        assert!(decode_line(UNKNOWN_TYPE_JSON.as_bytes()).is_err());
    }
}
