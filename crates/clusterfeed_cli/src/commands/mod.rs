//! CLI command implementations.

pub mod decode;
pub mod watch;

use clusterfeed_protocol::{encode_line, Event, EventData};

/// Renders an event in the requested format (text, json).
pub fn render_event(event: &Event, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    if format == "json" {
        let line = encode_line(event)?;
        return Ok(String::from_utf8_lossy(&line).trim_end().to_string());
    }

    Ok(match &event.data {
        EventData::Init(data) => format!(
            "init: isPrimary={} hostname={}",
            data.is_primary, data.hostname
        ),
        EventData::PrimaryChange(data) => format!(
            "primary change: isPrimary={} hostname={}",
            data.is_primary, data.hostname
        ),
        EventData::Tx(data) => {
            let mut line = format!(
                "tx: db={} txid={} checksum={} pageSize={} commit={}",
                event.db.as_deref().unwrap_or("-"),
                data.txid,
                data.post_apply_checksum,
                data.page_size,
                data.commit
            );
            if let Some(ts) = data.timestamp {
                line.push_str(&format!(" timestamp={}", ts.to_rfc3339()));
            }
            line
        }
    })
}
