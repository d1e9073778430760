//! Error types for the subscriber.

use clusterfeed_protocol::{EventType, ProtocolError};
use std::io;
use thiserror::Error;

/// Result type for subscriber operations.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Errors delivered on a subscription's error channel.
///
/// Every variant describes the end of one connection attempt. None of them
/// stop the subscription; the loop reconnects after reporting.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// The server answered with a status other than 200.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// The request could not be issued (bad URL, connect failure, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// A record was not well-formed JSON.
    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    /// A record declared an event type outside the known set.
    #[error("unknown event type: {0:?}")]
    UnknownEventType(String),

    /// A record's payload did not match its declared type.
    #[error("invalid {event_type} payload: {source}")]
    Payload {
        /// Declared event type.
        event_type: EventType,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// The stream ended in the middle of a record or was cut off.
    #[error("unexpected EOF")]
    UnexpectedEof,

    /// The stream ended cleanly on a record boundary.
    #[error("EOF")]
    Eof,

    /// Reading from the stream failed.
    #[error("read error: {0}")]
    Read(#[source] io::Error),
}

impl SubscriptionError {
    /// Creates a request error from anything displayable.
    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }

    /// Returns true if the server answered with a non-200 status.
    pub fn is_unexpected_status(&self) -> bool {
        matches!(self, SubscriptionError::UnexpectedStatus(_))
    }

    /// Returns true if the connection ended, cleanly or not.
    pub fn is_stream_termination(&self) -> bool {
        matches!(
            self,
            SubscriptionError::UnexpectedEof | SubscriptionError::Eof | SubscriptionError::Read(_)
        )
    }

    /// Returns true if a record failed structural parsing.
    pub fn is_syntax(&self) -> bool {
        match self {
            SubscriptionError::Decode(e) => e.is_syntax() || e.is_eof(),
            _ => false,
        }
    }
}

impl From<ProtocolError> for SubscriptionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Json(e) => SubscriptionError::Decode(e),
            ProtocolError::UnknownEventType(t) => SubscriptionError::UnknownEventType(t),
            ProtocolError::Payload { event_type, source } => {
                SubscriptionError::Payload { event_type, source }
            }
        }
    }
}

impl From<io::Error> for SubscriptionError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SubscriptionError::UnexpectedEof
        } else {
            SubscriptionError::Read(err)
        }
    }
}
