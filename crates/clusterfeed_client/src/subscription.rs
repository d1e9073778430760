//! The event subscription and its reconnect loop.
//!
//! A subscription owns one background task. The task opens a streaming
//! request, decodes records until the connection ends, reports how it ended
//! on the error channel, and starts over. It never stops on its own; only
//! [`EventSubscription::close`] (or dropping the subscription) ends it.

use crate::channel::{rendezvous, Receiver, Sender};
use crate::config::SubscriptionConfig;
use crate::error::SubscriptionError;
use crate::framing::FrameDecoder;
use crate::http::HyperClient;
use crate::state::{StatsCell, SubscriptionState, SubscriptionStats};
use crate::transport::StreamClient;
use clusterfeed_protocol::Event;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

/// Receiver for decoded events.
pub type EventReceiver = Receiver<Event>;

/// Receiver for connection and decode errors.
pub type ErrorReceiver = Receiver<SubscriptionError>;

/// A running subscription to an event stream.
///
/// Events and errors arrive on two separate channels. Errors are
/// informational: the subscription reconnects after each one. Consumers
/// typically wait on both at once:
///
/// ```rust,ignore
/// let mut sub = EventSubscription::subscribe(SubscriptionConfig::default());
/// loop {
///     let (events, errors) = sub.channels();
///     tokio::select! {
///         Some(event) = events.recv() => println!("{:?}", event.event_type()),
///         Some(err) = errors.recv() => eprintln!("stream error: {err}"),
///         else => break,
///     }
/// }
/// ```
///
/// Dropping the subscription closes it.
pub struct EventSubscription {
    handle: SubscriptionHandle,
    events: EventReceiver,
    errors: ErrorReceiver,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl EventSubscription {
    /// Starts a subscription using the built-in HTTP client.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn subscribe(config: SubscriptionConfig) -> Self {
        let client = HyperClient::from_config(&config);
        Self::with_client(config, client)
    }

    /// Starts a subscription using the given client.
    ///
    /// The loop is spawned immediately and makes its first request without
    /// waiting for the consumer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_client<C: StreamClient>(config: SubscriptionConfig, client: C) -> Self {
        let cancel = CancellationToken::new();
        let (event_tx, events) = rendezvous(cancel.clone());
        let (error_tx, errors) = rendezvous(cancel.clone());
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Starting);
        let stats = Arc::new(StatsCell::default());

        let task = tokio::spawn(
            SubscriptionLoop {
                config,
                client,
                cancel: cancel.clone(),
                events: event_tx,
                errors: error_tx,
                state: state_tx,
                stats: Arc::clone(&stats),
            }
            .run(),
        );

        Self {
            handle: SubscriptionHandle {
                cancel: cancel.clone(),
                state: state_rx,
                stats,
            },
            events,
            errors,
            task,
            _guard: cancel.drop_guard(),
        }
    }

    /// Returns the event channel.
    pub fn events(&mut self) -> &mut EventReceiver {
        &mut self.events
    }

    /// Returns the error channel.
    pub fn errors(&mut self) -> &mut ErrorReceiver {
        &mut self.errors
    }

    /// Returns both channels, for waiting on them together.
    pub fn channels(&mut self) -> (&mut EventReceiver, &mut ErrorReceiver) {
        (&mut self.events, &mut self.errors)
    }

    /// Waits for the next event. `None` once closed.
    pub async fn recv_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Waits for the next error. `None` once closed.
    pub async fn recv_error(&mut self) -> Option<SubscriptionError> {
        self.errors.recv().await
    }

    /// Returns a control handle.
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Closes the subscription. Idempotent.
    ///
    /// Neither channel yields a value after this returns. The background
    /// task drops its connection at its next suspension point.
    pub fn close(&self) {
        self.handle.close();
    }

    /// Closes the subscription and waits for the background task to exit.
    pub async fn shutdown(self) {
        self.handle.close();
        if let Err(err) = self.task.await {
            warn!(error = %err, "subscription task did not exit cleanly");
        }
    }

    /// Splits the subscription into a control handle and its two channels.
    ///
    /// After splitting, dropping no longer closes the subscription. It runs
    /// until [`SubscriptionHandle::close`] is called or the error receiver
    /// has been dropped.
    pub fn split(self) -> (SubscriptionHandle, EventReceiver, ErrorReceiver) {
        let Self {
            handle,
            events,
            errors,
            task: _,
            _guard,
        } = self;
        _guard.disarm();
        (handle, events, errors)
    }
}

/// Cloneable handle for observing and closing a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
    stats: Arc<StatsCell>,
}

impl SubscriptionHandle {
    /// Closes the subscription. Safe to call repeatedly and from any task.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Returns true once close has been requested.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Returns a receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Returns a snapshot of the subscription's counters.
    pub fn stats(&self) -> SubscriptionStats {
        self.stats.snapshot()
    }
}

/// Background task state. Owns the connection for its whole lifetime.
struct SubscriptionLoop<C> {
    config: SubscriptionConfig,
    client: C,
    cancel: CancellationToken,
    events: Sender<Event>,
    errors: Sender<SubscriptionError>,
    state: watch::Sender<SubscriptionState>,
    stats: Arc<StatsCell>,
}

impl<C: StreamClient> SubscriptionLoop<C> {
    async fn run(self) {
        info!(url = %self.config.url, "event subscription started");

        while let Some(err) = self.connect_and_stream().await {
            self.state.send_replace(SubscriptionState::Failed);
            warn!(url = %self.config.url, error = %err, "event stream failed, reconnecting");

            let message = err.to_string();
            let delivered = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                delivered = self.errors.send(err) => delivered,
            };
            self.stats.record_error(message, delivered);
            if !delivered {
                // nobody left to report the next failure to
                debug!("error receiver dropped");
                break;
            }

            if !self.config.reconnect_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break,
                    () = tokio::time::sleep(self.config.reconnect_delay) => {}
                }
            }
        }

        self.cancel.cancel();
        self.state.send_replace(SubscriptionState::Closed);
        info!(url = %self.config.url, "event subscription closed");
    }

    /// Runs one connection to completion.
    ///
    /// Returns the error that ended it, or `None` if the subscription was
    /// closed meanwhile.
    async fn connect_and_stream(&self) -> Option<SubscriptionError> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.state.send_replace(SubscriptionState::Starting);
        self.stats.record_attempt();
        debug!(url = %self.config.url, "connecting");

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return None,
            response = self.client.get(&self.config.url) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => return Some(err),
        };
        if !response.is_ok() {
            return Some(SubscriptionError::UnexpectedStatus(response.status));
        }

        self.state.send_replace(SubscriptionState::Connected);
        self.stats.record_connected();
        info!(url = %self.config.url, "event stream connected");

        let mut decoder = FrameDecoder::new(response.body);
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                next = decoder.next_event() => next,
            };
            let event = match next {
                Ok(event) => event,
                Err(err) => return Some(err),
            };
            debug!(event_type = %event.event_type(), db = ?event.db, "event received");

            let delivered = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                delivered = self.events.send(event) => delivered,
            };
            if delivered {
                self.stats.record_event();
            } else if self.errors.is_closed() {
                debug!("all receivers dropped");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockConnection, MockStreamClient};
    use clusterfeed_protocol::EventType;
    use std::time::Duration;

    const INIT: &str = "{\"type\":\"init\",\"data\":{\"isPrimary\":true,\"hostname\":\"node-1\"}}\n";
    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn next_event(sub: &mut EventSubscription) -> Event {
        tokio::time::timeout(TIMEOUT, sub.recv_event())
            .await
            .expect("timed out waiting for event")
            .expect("subscription closed")
    }

    async fn next_error(sub: &mut EventSubscription) -> SubscriptionError {
        tokio::time::timeout(TIMEOUT, sub.recv_error())
            .await
            .expect("timed out waiting for error")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn events_then_eof() {
        let client = MockStreamClient::new([MockConnection::ok([INIT])]);
        let mut sub = EventSubscription::with_client(SubscriptionConfig::default(), client);

        assert_eq!(next_event(&mut sub).await.event_type(), EventType::Init);
        assert!(matches!(next_error(&mut sub).await, SubscriptionError::Eof));
        sub.shutdown().await;
    }

    #[tokio::test]
    async fn error_precedes_next_connection_events() {
        let client = MockStreamClient::new([
            MockConnection::status(503),
            MockConnection::ok([INIT]),
        ]);
        let mut sub = EventSubscription::with_client(SubscriptionConfig::default(), client);

        // The loop cannot open the second connection until the error is taken.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sub.events().try_recv().is_none());

        let err = next_error(&mut sub).await;
        assert!(matches!(err, SubscriptionError::UnexpectedStatus(503)));
        assert_eq!(next_event(&mut sub).await.event_type(), EventType::Init);
    }

    #[tokio::test]
    async fn refused_request_is_reported_and_retried() {
        let client = Arc::new(MockStreamClient::new([
            MockConnection::Refused("connection refused".into()),
            MockConnection::ok([INIT]),
        ]));
        let mut sub =
            EventSubscription::with_client(SubscriptionConfig::default(), Arc::clone(&client));

        assert!(matches!(next_error(&mut sub).await, SubscriptionError::Request(_)));
        next_event(&mut sub).await;
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let client = MockStreamClient::new([MockConnection::ok([INIT, INIT])]);
        let mut sub = EventSubscription::with_client(SubscriptionConfig::default(), client);
        let handle = sub.handle().clone();

        next_event(&mut sub).await;
        sub.close();
        handle.close();

        assert!(handle.is_closed());
        assert!(sub.recv_event().await.is_none());
        assert!(sub.recv_error().await.is_none());
        sub.shutdown().await;
        assert_eq!(handle.state(), SubscriptionState::Closed);
    }

    #[tokio::test]
    async fn stats_track_deliveries() {
        let client = MockStreamClient::new([MockConnection::status(500), MockConnection::ok([INIT])]);
        let mut sub = EventSubscription::with_client(SubscriptionConfig::default(), client);

        next_error(&mut sub).await;
        next_event(&mut sub).await;
        next_error(&mut sub).await;
        // counters are updated after the hand-off; the third request stays pending
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = sub.handle().stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.errors_delivered, 2);
        assert_eq!(stats.last_error.as_deref(), Some("EOF"));
    }

    #[tokio::test]
    async fn dropping_receivers_after_split_stops_loop() {
        let client = MockStreamClient::new([MockConnection::ok([INIT])]);
        let sub = EventSubscription::with_client(SubscriptionConfig::default(), client);
        let (handle, events, errors) = sub.split();
        let mut state = handle.watch_state();

        drop(events);
        drop(errors);

        tokio::time::timeout(TIMEOUT, state.wait_for(|s| s.is_closed()))
            .await
            .expect("loop did not stop")
            .unwrap();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn dropping_error_receiver_stops_failing_loop() {
        let sub = EventSubscription::subscribe(SubscriptionConfig::new("not a url"));
        let (handle, _events, errors) = sub.split();
        let mut state = handle.watch_state();

        drop(errors);

        tokio::time::timeout(TIMEOUT, state.wait_for(|s| s.is_closed()))
            .await
            .expect("loop kept reconnecting")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.stats().attempts <= 1);
    }

    #[tokio::test]
    async fn reconnect_delay_is_interruptible() {
        let client = MockStreamClient::new([MockConnection::status(500)]);
        let config = SubscriptionConfig::default().with_reconnect_delay(Duration::from_secs(3600));
        let mut sub = EventSubscription::with_client(config, client);

        next_error(&mut sub).await;
        tokio::time::timeout(TIMEOUT, sub.shutdown())
            .await
            .expect("shutdown blocked by reconnect delay");
    }
}
