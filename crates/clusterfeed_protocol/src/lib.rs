//! # Clusterfeed Protocol
//!
//! Wire types and codec for the cluster coordination event stream.
//!
//! This crate provides:
//! - `Event` and its typed payloads (`init`, `primaryChange`, `tx`)
//! - `TxId` and `Checksum` hex identifiers that keep their wire text
//! - Line decoding and encoding for the newline-delimited JSON stream
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Wire format
//!
//! Each record is one JSON object terminated by `\n`:
//!
//! ```text
//! {"type":"tx","db":"db","data":{"txID":"0000000000000027", ...}}
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod event;
mod ids;

pub use envelope::{decode_line, encode_line};
pub use error::{ProtocolError, ProtocolResult};
pub use event::{
    Event, EventData, EventType, InitEventData, PrimaryChangeEventData, TxEventData,
};
pub use ids::{Checksum, ParseHexIdError, TxId};
