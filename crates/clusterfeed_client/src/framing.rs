//! Line framing over a streaming body.

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::transport::BodyStream;
use bytes::{Bytes, BytesMut};
use clusterfeed_protocol::{decode_line, Event};
use futures::StreamExt;
use tracing::trace;

/// Splits a body into `\n`-terminated records and decodes them.
///
/// Every error returned here is terminal for the connection: the caller is
/// expected to drop the decoder and reconnect.
pub struct FrameDecoder {
    body: BodyStream,
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no newline.
    scanned: usize,
}

impl FrameDecoder {
    /// Wraps an open response body.
    pub fn new(body: BodyStream) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Reads the next complete record, without its line terminator.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::Eof`] if the body ended on a record boundary
    /// - [`SubscriptionError::UnexpectedEof`] if it ended inside a record or
    ///   the transport reported truncation
    /// - [`SubscriptionError::Read`] for any other read failure
    pub async fn next_record(&mut self) -> SubscriptionResult<Bytes> {
        loop {
            let found = self.buf[self.scanned..].iter().position(|&b| b == b'\n');
            if let Some(offset) = found {
                let pos = self.scanned + offset;
                self.scanned = 0;
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                if line.is_empty() {
                    continue;
                }
                return Ok(line.freeze());
            }
            self.scanned = self.buf.len();

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    trace!(len = chunk.len(), "body chunk");
                    self.buf.extend_from_slice(&chunk);
                }
                Some(Err(err)) => return Err(err.into()),
                None if self.buf.is_empty() => return Err(SubscriptionError::Eof),
                None => return Err(SubscriptionError::UnexpectedEof),
            }
        }
    }

    /// Reads and decodes the next record.
    ///
    /// # Errors
    ///
    /// Any error of [`next_record`](Self::next_record), plus decode failures
    /// ([`SubscriptionError::Decode`], [`SubscriptionError::UnknownEventType`],
    /// [`SubscriptionError::Payload`]).
    pub async fn next_event(&mut self) -> SubscriptionResult<Event> {
        let record = self.next_record().await?;
        Ok(decode_line(&record)?)
    }
}
