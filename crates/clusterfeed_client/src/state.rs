//! Subscription state and statistics.

use parking_lot::RwLock;
use std::time::Instant;

/// Lifecycle state of a subscription.
///
/// `Connected` and `Failed` alternate for as long as the subscription
/// lives. `Closed` is only reached through an explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The loop is issuing a request.
    Starting,
    /// A stream is open and events are being decoded.
    Connected,
    /// The last connection attempt failed; a new one follows.
    Failed,
    /// The subscription was closed. Terminal.
    Closed,
}

impl SubscriptionState {
    /// Returns true if a stream is currently open.
    pub fn is_connected(&self) -> bool {
        matches!(self, SubscriptionState::Connected)
    }

    /// Returns true if the subscription has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, SubscriptionState::Closed)
    }
}

/// Counters describing a subscription's history.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionStats {
    /// Requests issued.
    pub attempts: u64,
    /// Requests answered with status 200.
    pub connections: u64,
    /// Events taken by the consumer.
    pub events_delivered: u64,
    /// Errors taken by the consumer.
    pub errors_delivered: u64,
    /// Time the current stream was opened.
    pub connected_since: Option<Instant>,
    /// Message of the most recent error.
    pub last_error: Option<String>,
}

/// Shared statistics, written by the loop and read by handles.
#[derive(Debug, Default)]
pub(crate) struct StatsCell(RwLock<SubscriptionStats>);

impl StatsCell {
    pub(crate) fn snapshot(&self) -> SubscriptionStats {
        self.0.read().clone()
    }

    pub(crate) fn record_attempt(&self) {
        self.0.write().attempts += 1;
    }

    pub(crate) fn record_connected(&self) {
        let mut stats = self.0.write();
        stats.connections += 1;
        stats.connected_since = Some(Instant::now());
    }

    pub(crate) fn record_event(&self) {
        self.0.write().events_delivered += 1;
    }

    pub(crate) fn record_error(&self, message: String, delivered: bool) {
        let mut stats = self.0.write();
        stats.connected_since = None;
        if delivered {
            stats.errors_delivered += 1;
        }
        stats.last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(SubscriptionState::Connected.is_connected());
        assert!(!SubscriptionState::Failed.is_connected());
        assert!(SubscriptionState::Closed.is_closed());
        assert!(!SubscriptionState::Starting.is_closed());
    }

    #[test]
    fn stats_accumulate() {
        let cell = StatsCell::default();
        cell.record_attempt();
        cell.record_connected();
        cell.record_event();
        cell.record_error("EOF".into(), true);
        cell.record_attempt();
        cell.record_error("unexpected status: 500".into(), false);

        let stats = cell.snapshot();
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.errors_delivered, 1);
        assert!(stats.connected_since.is_none());
        assert_eq!(stats.last_error.as_deref(), Some("unexpected status: 500"));
    }
}
