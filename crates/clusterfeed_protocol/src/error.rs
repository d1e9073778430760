//! Error types for the protocol crate.

use crate::event::EventType;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding or encoding a record.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The record is not a well-formed envelope.
    #[error("{0}")]
    Json(#[source] serde_json::Error),

    /// The envelope declared a type outside the known set.
    #[error("unknown event type: {0:?}")]
    UnknownEventType(String),

    /// The envelope was valid but its payload did not match the declared type.
    #[error("invalid {event_type} payload: {source}")]
    Payload {
        /// Declared event type.
        event_type: EventType,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Returns true if the record failed structural parsing.
    pub fn is_syntax(&self) -> bool {
        match self {
            ProtocolError::Json(e) => e.is_syntax() || e.is_eof(),
            _ => false,
        }
    }
}
