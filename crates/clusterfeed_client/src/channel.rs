//! Rendezvous delivery channels.
//!
//! A send completes only after the consumer has taken the value, so the
//! subscription never runs ahead of its consumer by more than one value.
//! This keeps the two channels ordered relative to each other: an error is
//! always observed before any event sent after it.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

type Envelope<T> = (T, oneshot::Sender<()>);

/// Creates a rendezvous channel whose receiver stops yielding once `cancel`
/// fires.
pub(crate) fn rendezvous<T>(cancel: CancellationToken) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (Sender { tx }, Receiver { rx, cancel })
}

/// Sending half, owned by the subscription loop.
pub(crate) struct Sender<T> {
    tx: mpsc::Sender<Envelope<T>>,
}

impl<T> Sender<T> {
    /// Hands `value` to the consumer and waits until it has been taken.
    ///
    /// Returns false if the receiver was dropped before taking the value.
    pub(crate) async fn send(&self, value: T) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send((value, ack_tx)).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }

    /// Returns true if the receiver has been dropped.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a delivery channel.
///
/// Yields `None` once the subscription has been closed, even if a value
/// was still pending.
#[derive(Debug)]
pub struct Receiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
    cancel: CancellationToken,
}

impl<T> Receiver<T> {
    /// Waits for the next value.
    ///
    /// Cancel-safe: dropping the future before it completes loses nothing.
    pub async fn recv(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            item = self.rx.recv() => item.map(take),
        }
    }

    /// Takes a value if one is ready without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok().map(take)
    }
}

fn take<T>((value, ack): Envelope<T>) -> T {
    let _ = ack.send(());
    value
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx).map(|item| item.map(take))
    }
}
