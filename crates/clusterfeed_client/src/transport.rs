//! Streaming transport abstraction.
//!
//! The subscriber only needs a cancellable `GET` that yields a status code
//! and a readable byte stream. Implement [`StreamClient`] to plug in a
//! different HTTP stack; [`HyperClient`](crate::HyperClient) is the default.

use crate::error::{SubscriptionError, SubscriptionResult};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Body of a streaming response.
///
/// Truncation is reported as an item with [`io::ErrorKind::UnexpectedEof`].
/// Dropping the stream releases the underlying connection.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Response head plus the still-open body.
pub struct StreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: BodyStream,
}

impl StreamResponse {
    /// Creates a response from a status and body.
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self { status, body }
    }

    /// Returns true if the status is 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// A client able to open streaming `GET` requests.
///
/// The returned future is dropped when the subscription is closed, so
/// implementations must release any partially opened connection on drop.
pub trait StreamClient: Send + Sync + 'static {
    /// Issues a `GET` against `url` and returns once the response head has
    /// arrived.
    fn get(&self, url: &str) -> impl Future<Output = SubscriptionResult<StreamResponse>> + Send;
}

/// One scripted connection served by [`MockStreamClient`].
#[derive(Debug)]
pub enum MockConnection {
    /// The request fails before a response arrives.
    Refused(String),
    /// The server answers with a status and body chunks.
    Respond {
        /// HTTP status code.
        status: u16,
        /// Body chunks, delivered in order.
        chunks: Vec<io::Result<Bytes>>,
    },
}

impl MockConnection {
    /// A 200 response carrying the given chunks, then a clean end.
    pub fn ok<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::Respond {
            status: 200,
            chunks: chunks.into_iter().map(|c| Ok(c.into())).collect(),
        }
    }

    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            chunks: Vec::new(),
        }
    }

    /// A 200 response whose body is cut off after the given chunks.
    pub fn truncated<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let mut chunks: Vec<io::Result<Bytes>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        chunks.push(Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before body completed",
        )));
        Self::Respond {
            status: 200,
            chunks,
        }
    }
}

/// An in-memory [`StreamClient`] for testing.
///
/// Each request consumes the next scripted connection. Once the script is
/// exhausted, requests stay pending until the subscription is closed.
#[derive(Debug, Default)]
pub struct MockStreamClient {
    script: Mutex<VecDeque<MockConnection>>,
    requests: AtomicUsize,
}

impl MockStreamClient {
    /// Creates a client that serves the given connections in order.
    pub fn new(script: impl IntoIterator<Item = MockConnection>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Appends a connection to the script.
    pub fn push(&self, connection: MockConnection) {
        self.script.lock().push_back(connection);
    }

    /// Returns the number of requests issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl StreamClient for MockStreamClient {
    async fn get(&self, _url: &str) -> SubscriptionResult<StreamResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(MockConnection::Refused(reason)) => Err(SubscriptionError::Request(reason)),
            Some(MockConnection::Respond { status, chunks }) => Ok(StreamResponse::new(
                status,
                stream::iter(chunks).boxed(),
            )),
            None => futures::future::pending().await,
        }
    }
}

impl<C: StreamClient> StreamClient for std::sync::Arc<C> {
    fn get(&self, url: &str) -> impl Future<Output = SubscriptionResult<StreamResponse>> + Send {
        (**self).get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_script_in_order() {
        let client = MockStreamClient::new([
            MockConnection::status(500),
            MockConnection::ok(["a\n", "b\n"]),
        ]);

        let first = client.get("http://test/events").await.unwrap();
        assert_eq!(first.status, 500);
        assert!(!first.is_ok());

        let second = client.get("http://test/events").await.unwrap();
        assert!(second.is_ok());
        let chunks: Vec<_> = second.body.collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn mock_refused_is_request_error() {
        let client = MockStreamClient::new([MockConnection::Refused("connection refused".into())]);
        let err = client.get("http://test/events").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Request(_)));
    }

    #[tokio::test]
    async fn mock_truncated_ends_with_eof_error() {
        let client = MockStreamClient::new([MockConnection::truncated(["partial"])]);
        let resp = client.get("http://test/events").await.unwrap();
        let chunks: Vec<_> = resp.body.collect().await;
        let last = chunks.last().unwrap().as_ref().unwrap_err();
        assert_eq!(last.kind(), io::ErrorKind::UnexpectedEof);
    }
}
