//! Scripted event endpoint.
//!
//! The server speaks just enough HTTP/1.1 to stand in for a coordination
//! node. All connections share one script: each connection consumes steps
//! from the front until it ends, so a script can describe several
//! consecutive connections.
//!
//! Lines are buffered until a [`Step::Flush`], which sends them as one chunk.
//! A connection that runs out of steps flushes what is left and terminates
//! the chunked body cleanly.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

/// Upper bound on a request head.
const MAX_HEAD: usize = 16 * 1024;

/// One scripted server action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Buffer a line; the newline is appended.
    Line(String),
    /// Buffer bytes as they are, with no newline.
    Raw(Vec<u8>),
    /// Send buffered lines as one chunk.
    Flush,
    /// Pause before the next step.
    Sleep(Duration),
    /// Answer with this status and an empty body, then end the connection.
    /// Ignored once the 200 head has been sent.
    Status(u16),
    /// Close the socket without finishing the body.
    Hangup,
}

impl Step {
    /// A line step.
    pub fn line(line: impl Into<String>) -> Self {
        Step::Line(line.into())
    }

    /// A raw bytes step.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Step::Raw(bytes.into())
    }

    /// A sleep step of `ms` milliseconds.
    pub fn sleep_ms(ms: u64) -> Self {
        Step::Sleep(Duration::from_millis(ms))
    }

    /// Steps that write `line`, flush it, and pause briefly, the usual
    /// shape of a live event.
    pub fn event(line: impl Into<String>) -> [Step; 3] {
        [Step::line(line), Step::Flush, Step::sleep_ms(10)]
    }
}

type Script = Arc<Mutex<VecDeque<Step>>>;

/// A local HTTP server replaying a script of [`Step`]s.
///
/// Stops accepting and closes open connections when dropped.
pub struct ScriptedServer {
    addr: SocketAddr,
    script: Script,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl ScriptedServer {
    /// Binds to an ephemeral localhost port and starts serving.
    pub async fn start(steps: impl IntoIterator<Item = Step>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let script: Script = Arc::new(Mutex::new(steps.into_iter().collect()));
        let requests = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&script),
            Arc::clone(&requests),
        ));

        Ok(Self {
            addr,
            script,
            requests,
            task,
        })
    }

    /// Returns the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the events endpoint URL.
    pub fn url(&self) -> String {
        format!("http://{}/events", self.addr)
    }

    /// Appends steps to the script.
    pub fn extend(&self, steps: impl IntoIterator<Item = Step>) {
        self.script.lock().extend(steps);
    }

    /// Returns the number of steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, script: Script, requests: Arc<AtomicUsize>) {
    // dropping the set with the task aborts every open connection
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { continue };
                let script = Arc::clone(&script);
                let requests = Arc::clone(&requests);
                connections.spawn(async move {
                    let _ = serve(stream, script, requests).await;
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve(mut stream: TcpStream, script: Script, requests: Arc<AtomicUsize>) -> io::Result<()> {
    read_request_head(&mut stream).await?;
    requests.fetch_add(1, Ordering::SeqCst);

    let mut head_sent = false;
    let mut pending = Vec::new();

    loop {
        let step = script.lock().pop_front();
        match step {
            Some(Step::Line(line)) => {
                pending.extend_from_slice(line.as_bytes());
                pending.push(b'\n');
            }
            Some(Step::Raw(bytes)) => pending.extend_from_slice(&bytes),
            Some(Step::Flush) => {
                write_chunk(&mut stream, &mut head_sent, &mut pending).await?;
                stream.flush().await?;
            }
            Some(Step::Sleep(duration)) => tokio::time::sleep(duration).await,
            Some(Step::Status(code)) if !head_sent => {
                let head = format!(
                    "HTTP/1.1 {code} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    reason(code)
                );
                stream.write_all(head.as_bytes()).await?;
                stream.flush().await?;
                return Ok(());
            }
            Some(Step::Status(_)) | None => {
                write_chunk(&mut stream, &mut head_sent, &mut pending).await?;
                stream.write_all(b"0\r\n\r\n").await?;
                stream.flush().await?;
                return Ok(());
            }
            Some(Step::Hangup) => return Ok(()),
        }
    }
}

async fn read_request_head(stream: &mut TcpStream) -> io::Result<()> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        if head.len() > MAX_HEAD {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request head too large"));
        }
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        head.extend_from_slice(&buf[..n]);
    }
    Ok(())
}

async fn write_chunk(
    stream: &mut TcpStream,
    head_sent: &mut bool,
    pending: &mut Vec<u8>,
) -> io::Result<()> {
    if !*head_sent {
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                  transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await?;
        *head_sent = true;
    }
    if !pending.is_empty() {
        let mut chunk = format!("{:x}\r\n", pending.len()).into_bytes();
        chunk.append(pending);
        chunk.extend_from_slice(b"\r\n");
        stream.write_all(&chunk).await?;
    }
    Ok(())
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fetch(server: &ScriptedServer) -> String {
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        stream
            .write_all(b"GET /events HTTP/1.1\r\nhost: test\r\n\r\n")
            .await
            .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_chunked_lines() {
        let server = ScriptedServer::start([Step::line("a"), Step::Flush, Step::line("b")])
            .await
            .unwrap();
        let response = fetch(&server).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("transfer-encoding: chunked"));
        assert!(response.contains("2\r\na\n\r\n"));
        assert!(response.contains("2\r\nb\n\r\n"));
        assert!(response.ends_with("0\r\n\r\n"));
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn status_step_ends_connection() {
        let server = ScriptedServer::start([Step::Status(500), Step::line("next")])
            .await
            .unwrap();
        let response = fetch(&server).await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert_eq!(server.remaining(), 1);
    }

    #[tokio::test]
    async fn hangup_leaves_body_unfinished() {
        let server = ScriptedServer::start([Step::line("a"), Step::Flush, Step::Hangup])
            .await
            .unwrap();
        let response = fetch(&server).await;
        assert!(response.contains("2\r\na\n\r\n"));
        assert!(!response.ends_with("0\r\n\r\n"));
    }

    #[tokio::test]
    async fn raw_bytes_are_sent_verbatim() {
        let server = ScriptedServer::start([Step::raw("{\"ty"), Step::Flush, Step::Hangup])
            .await
            .unwrap();
        let response = fetch(&server).await;
        assert!(response.contains("4\r\n{\"ty\r\n"));
        assert!(!response.ends_with("0\r\n\r\n"));
    }

    #[tokio::test]
    async fn steps_can_be_appended() {
        let server = ScriptedServer::start(Vec::new()).await.unwrap();
        server.extend(Step::event("x"));
        assert_eq!(server.remaining(), 3);
    }
}
