//! Watch command implementation.

use super::render_event;
use clusterfeed_client::{Event, EventSubscription, SubscriptionConfig, SubscriptionError};
use tracing::{info, warn};

/// What the watch loop saw next.
enum Next {
    Event(Event),
    Error(SubscriptionError),
    Closed,
    Interrupted,
}

/// Runs the watch command.
///
/// Prints events until `max_events` have been seen or the process is
/// interrupted. Stream errors are logged and the subscription reconnects,
/// unless `exit_on_error` is set.
pub async fn run(
    config: SubscriptionConfig,
    max_events: Option<u64>,
    exit_on_error: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(url = %config.url, "watching event stream");
    let mut sub = EventSubscription::subscribe(config);
    let mut seen = 0u64;

    let outcome = loop {
        if max_events.is_some_and(|max| seen >= max) {
            break Ok(());
        }

        let next = {
            let (events, errors) = sub.channels();
            tokio::select! {
                event = events.recv() => event.map_or(Next::Closed, Next::Event),
                err = errors.recv() => err.map_or(Next::Closed, Next::Error),
                _ = tokio::signal::ctrl_c() => Next::Interrupted,
            }
        };

        match next {
            Next::Event(event) => {
                println!("{}", render_event(&event, format)?);
                seen += 1;
            }
            Next::Error(err) if exit_on_error => break Err(err.into()),
            Next::Error(err) => warn!(error = %err, "stream interrupted, reconnecting"),
            Next::Closed => break Ok(()),
            Next::Interrupted => {
                info!("interrupted");
                break Ok(());
            }
        }
    };

    let stats = sub.handle().stats();
    sub.shutdown().await;
    info!(
        events = stats.events_delivered,
        errors = stats.errors_delivered,
        attempts = stats.attempts,
        "subscription closed"
    );
    outcome
}
