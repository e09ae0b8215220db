//! Inbound read loop.
//!
//! One loop runs per inbound stream. It reads fixed-size chunks, appends
//! them to a private [`BytesMut`] buffer, offers the whole buffer to the
//! stream's [`StreamConsumer`] and drops whatever the consumer reports as
//! consumed. Any read error, EOF or consumer error ends the loop for good.

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::endpoint::consumer::StreamConsumer;
use crate::endpoint::{BoxedReader, StreamKind};

/// Why a read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stream reached end of file.
    Eof,
    /// Reading from the stream failed.
    ReadFailed(String),
    /// The consumer returned an error or an impossible consumed count.
    ConsumerFailed(String),
    /// The endpoint was shut down.
    Cancelled,
}

/// Run the read loop for one inbound stream until it terminates.
///
/// When `consumer` is `None` the bytes are read and discarded so the peer
/// never blocks on a full pipe; nothing is buffered.
///
/// The consumer's `on_close` hook runs before returning, whatever the
/// reason for exiting.
pub async fn run_read_loop(
    stream: StreamKind,
    mut source: BoxedReader,
    mut consumer: Option<Box<dyn StreamConsumer>>,
    chunk_bytes: usize,
    cancel: CancellationToken,
) -> ReaderExit {
    let mut chunk = vec![0u8; chunk_bytes.max(1)];
    let mut buffer = BytesMut::new();

    let exit = loop {
        let read = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(%stream, "endpoint reader: cancellation received, stopping");
                break ReaderExit::Cancelled;
            }

            read = source.read(&mut chunk) => read,
        };

        let n = match read {
            Ok(0) => {
                debug!(%stream, "endpoint reader: EOF detected, stopping");
                break ReaderExit::Eof;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(%stream, error = %e, "endpoint reader: read failed, stopping");
                break ReaderExit::ReadFailed(e.to_string());
            }
        };

        let Some(consumer) = consumer.as_mut() else {
            trace!(%stream, bytes = n, "endpoint reader: no consumer, discarding");
            continue;
        };

        buffer.extend_from_slice(&chunk[..n]);

        match consumer.consume(&buffer) {
            Ok(taken) if taken <= buffer.len() => {
                buffer.advance(taken);
                trace!(
                    %stream,
                    consumed = taken,
                    pending = buffer.len(),
                    "endpoint reader: buffer advanced"
                );
            }
            Ok(taken) => {
                let msg = format!(
                    "consumer reported {taken} bytes consumed but only {} are buffered",
                    buffer.len()
                );
                warn!(%stream, error = msg.as_str(), "endpoint reader: consumer overran buffer, stopping");
                break ReaderExit::ConsumerFailed(msg);
            }
            Err(e) => {
                warn!(%stream, error = %e, "endpoint reader: consumer failed, stopping");
                break ReaderExit::ConsumerFailed(e.to_string());
            }
        }
    };

    if let Some(consumer) = consumer.as_mut() {
        consumer.on_close();
    }

    exit
}
