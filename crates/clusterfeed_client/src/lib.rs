//! # Clusterfeed Client
//!
//! Resilient subscriber for the cluster coordination event stream.
//!
//! This crate provides:
//! - `EventSubscription`, a handle over a background reconnect loop
//! - Separate event and error channels with rendezvous delivery
//! - Line framing and typed decoding of the streaming body
//! - A `StreamClient` transport abstraction with a hyper implementation
//!
//! ## Architecture
//!
//! The subscription runs one background task per instance:
//! 1. Issue a streaming `GET` against the configured endpoint
//! 2. On status 200, decode one record per line and deliver each event
//! 3. When the connection ends for any reason, deliver one error and go
//!    back to step 1
//!
//! ## Key Invariants
//!
//! - The loop only stops when the subscription is closed or nobody is left
//!   to receive its errors
//! - Events of one connection are delivered in wire order
//! - The error ending a connection is observed before any event of the next
//! - A clean end of stream is reported as an error (`EOF`) like a truncation
//! - Nothing is delivered on either channel after close

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod channel;
mod config;
mod error;
mod framing;
mod http;
mod state;
mod subscription;
mod transport;

pub use channel::Receiver;
pub use config::{SubscriptionConfig, DEFAULT_EVENTS_URL};
pub use error::{SubscriptionError, SubscriptionResult};
pub use framing::FrameDecoder;
pub use self::http::HyperClient;
pub use state::{SubscriptionState, SubscriptionStats};
pub use subscription::{ErrorReceiver, EventReceiver, EventSubscription, SubscriptionHandle};
pub use transport::{BodyStream, MockConnection, MockStreamClient, StreamClient, StreamResponse};

pub use clusterfeed_protocol::{
    Checksum, Event, EventData, EventType, InitEventData, PrimaryChangeEventData, TxEventData,
    TxId,
};
