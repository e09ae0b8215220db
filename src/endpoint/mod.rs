//! Stream endpoint: raw byte movement between the process boundary and the
//! framing logic above it.
//!
//! An [`Endpoint`] owns one outbound writable stream and up to two inbound
//! readable streams (see [`StreamKind`]). It has no protocol knowledge:
//!
//! - `reader`: per-stream read loop feeding a pluggable [`StreamConsumer`].
//! - `writer`: serialized complete-write of outbound bytes.
//! - `consumer`: the consumer trait and a closure adapter.
//!
//! # Lifecycle
//!
//! 1. [`Endpoint::new`] with the outbound stream.
//! 2. [`Endpoint::attach`] each inbound stream with its optional consumer.
//! 3. [`Endpoint::run`] spawns one tokio task per inbound stream.
//! 4. [`Endpoint::input`] writes outbound bytes at any time.
//! 5. [`Endpoint::shutdown`] stops every read loop; loops never restart.

pub mod consumer;
pub mod reader;
pub mod writer;

use std::fmt::{Display, Formatter};
use std::sync::PoisonError;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use consumer::{consumer_fn, StreamConsumer};
pub use reader::{run_read_loop, ReaderExit};

use crate::Result;

/// Boxed inbound byte source.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Boxed outbound byte sink.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Read size used when none is configured.
pub const DEFAULT_CHUNK_BYTES: usize = 4096;

/// Identifies an inbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The data stream carrying framed protocol messages.
    Primary,
    /// The diagnostic stream carrying unstructured error text.
    Diagnostic,
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Diagnostic => f.write_str("diagnostic"),
        }
    }
}

/// An inbound stream waiting for [`Endpoint::run`].
struct Inbound {
    kind: StreamKind,
    source: BoxedReader,
    consumer: Option<Box<dyn StreamConsumer>>,
}

/// Owner of the outbound stream and the inbound read loops.
pub struct Endpoint {
    outbound: Mutex<BoxedWriter>,
    inbound: std::sync::Mutex<Vec<Inbound>>,
    chunk_bytes: usize,
    cancel: CancellationToken,
}

impl Endpoint {
    /// Create an endpoint writing to `outbound`, with no inbound streams yet.
    pub fn new<W>(outbound: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            outbound: Mutex::new(Box::new(outbound)),
            inbound: std::sync::Mutex::new(Vec::new()),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the number of bytes requested per read. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Register an inbound stream and its consumer.
    ///
    /// A stream attached without a consumer is still drained. Attaching a
    /// second stream of the same kind replaces the first one if the loops
    /// have not been started yet.
    pub fn attach<R>(
        &mut self,
        kind: StreamKind,
        source: R,
        consumer: Option<Box<dyn StreamConsumer>>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let inbound = self
            .inbound
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        inbound.retain(|s| s.kind != kind);
        inbound.push(Inbound {
            kind,
            source: Box::new(source),
            consumer,
        });
    }

    /// Spawn one independent read loop per attached inbound stream.
    ///
    /// Must be called from within a tokio runtime. Calling it again starts
    /// nothing: attached streams are handed to their loops exactly once.
    pub fn run(&self) -> Vec<(StreamKind, JoinHandle<ReaderExit>)> {
        let attached: Vec<Inbound> = self
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        attached
            .into_iter()
            .map(|inbound| {
                debug!(stream = %inbound.kind, "endpoint: starting read loop");
                let handle = tokio::spawn(run_read_loop(
                    inbound.kind,
                    inbound.source,
                    inbound.consumer,
                    self.chunk_bytes,
                    self.cancel.clone(),
                ));
                (inbound.kind, handle)
            })
            .collect()
    }

    /// Write every byte of `data` to the outbound stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RpcError::Transport`] on the first write or flush failure.
    pub async fn input(&self, data: &[u8]) -> Result<()> {
        writer::write_all(&self.outbound, data).await
    }

    /// Stop every running read loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
