//! # Clusterfeed Testkit
//!
//! Test utilities for clusterfeed.
//!
//! This crate provides:
//! - `ScriptedServer`, a raw HTTP/1.1 event endpoint driven by a script of
//!   lines, flushes, sleeps, error statuses and hangups
//! - Canonical wire lines and the events they decode to
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clusterfeed_testkit::prelude::*;
//!
//! let server = ScriptedServer::start([
//!     Step::line(INIT_EVENT_JSON),
//!     Step::Flush,
//!     Step::Hangup,
//! ])
//! .await?;
//! let sub = EventSubscription::subscribe(SubscriptionConfig::new(server.url()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use server::*;
