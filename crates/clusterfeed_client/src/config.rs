//! Configuration for event subscriptions.

use std::time::Duration;

/// Endpoint used when no URL is configured.
pub const DEFAULT_EVENTS_URL: &str = "http://localhost:20202/events";

/// Configuration for an event subscription.
///
/// The configuration is moved into the subscription when it starts, so the
/// target URL cannot change while the loop is running.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Streaming endpoint URL.
    pub url: String,
    /// Bound on connecting and receiving the response head.
    pub connect_timeout: Option<Duration>,
    /// Pause between a failed connection and the next attempt.
    pub reconnect_delay: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl SubscriptionConfig {
    /// Creates a configuration for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Some(Duration::from_secs(10)),
            reconnect_delay: Duration::ZERO,
            user_agent: concat!("clusterfeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables the connect timeout.
    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Sets the pause between reconnect attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the `User-Agent` header value.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EVENTS_URL)
    }
}
