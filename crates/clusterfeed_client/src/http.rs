//! HTTP/1.1 streaming client built on hyper.
//!
//! Each request opens a dedicated TCP connection, wrapped in TLS for
//! `https://` endpoints. The connection driver runs on its own task and is
//! aborted as soon as the response body is dropped, which is how a
//! subscription releases a connection on reconnect or close.

use crate::config::SubscriptionConfig;
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::transport::{StreamClient, StreamResponse};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::{header, Method, Request};
use http_body_util::Empty;
use hyper::body::{Body, Incoming};
use hyper_util::rt::TokioIo;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::AbortHandle;
use tokio_rustls::rustls::{self, pki_types::ServerName};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};
use url::{Host, Position, Url};

/// Streaming client for `http://` and `https://` endpoints.
///
/// Server certificates are checked against the bundled webpki roots unless
/// a connector is supplied with [`with_tls_connector`](Self::with_tls_connector).
/// Redirects are not followed; a redirect status is reported like any other
/// non-200 answer.
#[derive(Clone)]
pub struct HyperClient {
    connect_timeout: Option<Duration>,
    user_agent: String,
    tls: Option<TlsConnector>,
}

impl HyperClient {
    /// Creates a client with no connect timeout.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            connect_timeout: None,
            user_agent: user_agent.into(),
            tls: None,
        }
    }

    /// Creates a client using the timeout and user agent of a subscription.
    pub fn from_config(config: &SubscriptionConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
            tls: None,
        }
    }

    /// Sets the bound on connecting and receiving the response head.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Uses `connector` for `https://` endpoints, e.g. to trust a private CA.
    pub fn with_tls_connector(mut self, connector: TlsConnector) -> Self {
        self.tls = Some(connector);
        self
    }

    async fn open(&self, url: &str) -> SubscriptionResult<StreamResponse> {
        let url = Url::parse(url).map_err(SubscriptionError::request)?;
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            scheme => {
                return Err(SubscriptionError::Request(format!(
                    "unsupported scheme: {scheme}"
                )))
            }
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(SubscriptionError::request("url has no host")),
        };
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(SubscriptionError::request)?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to disable Nagle");
        }

        if !secure {
            return self.send(&url, stream).await;
        }

        let connector = match &self.tls {
            Some(connector) => connector.clone(),
            None => tls_connector()?,
        };
        let domain = ServerName::try_from(host).map_err(SubscriptionError::request)?;
        let stream = connector
            .connect(domain, stream)
            .await
            .map_err(SubscriptionError::request)?;
        trace!("tls handshake complete");
        self.send(&url, stream).await
    }

    /// Runs the HTTP/1.1 handshake over `io` and sends the `GET`.
    async fn send<S>(&self, url: &Url, io: S) -> SubscriptionResult<StreamResponse>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
            .await
            .map_err(SubscriptionError::request)?;
        let driver = tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(error = %err, "connection driver exited");
            }
        });
        let guard = AbortOnDrop(driver.abort_handle());

        let request = Request::builder()
            .method(Method::GET)
            .uri(&url[Position::BeforePath..Position::AfterQuery])
            .header(header::HOST, &url[Position::BeforeHost..Position::AfterPort])
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, self.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(SubscriptionError::request)?;

        let response = sender
            .send_request(request)
            .await
            .map_err(SubscriptionError::request)?;
        let status = response.status().as_u16();
        trace!(status, "response head received");

        let body = ResponseBody {
            body: response.into_body(),
            _guard: guard,
        };
        Ok(StreamResponse::new(status, body.boxed()))
    }
}

impl fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperClient")
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("custom_tls", &self.tls.is_some())
            .finish()
    }
}

/// Builds a TLS connector trusting the webpki roots.
fn tls_connector() -> SubscriptionResult<TlsConnector> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(SubscriptionError::request)?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(TlsConnector::from(Arc::new(config)))
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::from_config(&SubscriptionConfig::default())
    }
}

impl StreamClient for HyperClient {
    async fn get(&self, url: &str) -> SubscriptionResult<StreamResponse> {
        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.open(url))
                .await
                .map_err(|_| SubscriptionError::Request(format!("timed out after {limit:?}")))?,
            None => self.open(url).await,
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Data frames of a response body. Owns the connection driver.
struct ResponseBody {
    body: Incoming,
    _guard: AbortOnDrop,
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.body).poll_frame(cx)) {
                None => return Poll::Ready(None),
                Some(Ok(frame)) => {
                    // trailers carry nothing for us
                    if let Ok(data) = frame.into_data() {
                        return Poll::Ready(Some(Ok(data)));
                    }
                }
                Some(Err(err)) => return Poll::Ready(Some(Err(body_error(err)))),
            }
        }
    }
}

/// Maps a hyper body error onto an `io::Error`, keeping the kind of the
/// underlying I/O failure so truncation surfaces as `UnexpectedEof`.
fn body_error(err: hyper::Error) -> io::Error {
    let mut kind = if err.is_incomplete_message() {
        io::ErrorKind::UnexpectedEof
    } else {
        io::ErrorKind::Other
    };

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            kind = io_err.kind();
            break;
        }
        source = cause.source();
    }

    io::Error::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_config() {
        let config = SubscriptionConfig::new("http://127.0.0.1:1/events")
            .with_connect_timeout(Duration::from_millis(500))
            .with_user_agent("probe");
        let client = HyperClient::from_config(&config);
        assert_eq!(client.connect_timeout, Some(Duration::from_millis(500)));
        assert_eq!(client.user_agent, "probe");
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let client = HyperClient::new("test");
        let err = client.get("ftp://localhost/events").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Request(ref m) if m.contains("ftp")));
    }

    #[test]
    fn default_tls_connector_builds() {
        assert!(tls_connector().is_ok());
    }

    #[tokio::test]
    async fn https_performs_tls_handshake() {
        // A plain TCP peer that hangs up fails the handshake, not the scheme check.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let client = HyperClient::new("test").with_connect_timeout(Duration::from_secs(2));
        let err = client
            .get(&format!("https://{addr}/events"))
            .await
            .unwrap_err();
        let SubscriptionError::Request(message) = err else {
            panic!("expected request error");
        };
        assert!(!message.contains("unsupported scheme"), "{message}");
    }

    #[tokio::test]
    async fn rejects_malformed_url() {
        let client = HyperClient::new("test");
        let err = client.get("not a url").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Request(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HyperClient::new("test").with_connect_timeout(Duration::from_secs(2));
        let err = client
            .get(&format!("http://{addr}/events"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Request(_)));
    }
}
