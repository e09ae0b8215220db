//! JSON-RPC client over an [`Endpoint`].
//!
//! A [`Client`] writes framed requests through its endpoint and resolves
//! them from the primary stream's read loop. Every request gets its own
//! rendezvous channel, so one client can have any number of requests in
//! flight; share it across tasks through an `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = Client::builder(child_stdin)
//!     .primary(child_stdout)
//!     .diagnostic(child_stderr)
//!     .handler_fn(|msg| {
//!         tracing::info!(method = ?msg.method, "server message");
//!         Ok(())
//!     })
//!     .start()?;
//!
//! let reply = client.request("initialize", Some(params)).await?;
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::endpoint::{BoxedReader, BoxedWriter, Endpoint, ReaderExit, StreamKind};
use crate::rpc::correlation::{PendingGuard, PendingRequests};
use crate::rpc::diagnostic::DiagnosticSink;
use crate::rpc::dispatch::{
    handler_fn, Dispatcher, HandlerFailure, PrimaryConsumer, ResponseHandler,
};
use crate::rpc::envelope::{encode_notification, encode_request, Response};
use crate::{Result, RpcError};

/// Collects the streams, handler and configuration of a [`Client`].
pub struct ClientBuilder {
    outbound: BoxedWriter,
    primary: Option<BoxedReader>,
    diagnostic: Option<BoxedReader>,
    diagnostic_sink: Option<DiagnosticSink>,
    handler: Option<Arc<dyn ResponseHandler>>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Start a builder writing outgoing frames to `outbound`.
    pub fn new<W>(outbound: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            outbound: Box::new(outbound),
            primary: None,
            diagnostic: None,
            diagnostic_sink: None,
            handler: None,
            config: ClientConfig::default(),
        }
    }

    /// Stream carrying the peer's framed messages.
    #[must_use]
    pub fn primary<R>(mut self, source: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.primary = Some(Box::new(source));
        self
    }

    /// Stream carrying the peer's unstructured error text.
    #[must_use]
    pub fn diagnostic<R>(mut self, source: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.diagnostic = Some(Box::new(source));
        self
    }

    /// Where diagnostic bytes go; standard error when unset.
    #[must_use]
    pub fn diagnostic_sink(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostic_sink = Some(sink);
        self
    }

    /// Handler for messages no waiting request claims.
    #[must_use]
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: ResponseHandler + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Closure form of [`handler`](Self::handler).
    #[must_use]
    pub fn handler_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Response) -> Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(handler_fn(f));
        self
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and start the read loops.
    ///
    /// Must be called from within a tokio runtime. Without a primary stream
    /// the client can only send: `request` fails immediately.
    ///
    /// # Errors
    ///
    /// [`RpcError::Config`] if the configuration is invalid.
    pub fn start(self) -> Result<Client> {
        let config = self.config;
        config.validate()?;

        let pending = Arc::new(PendingRequests::new());
        let (failures_tx, failures_rx) = mpsc::channel(config.failure_channel_capacity);

        let mut endpoint = Endpoint::new(self.outbound).with_chunk_bytes(config.read_chunk_bytes);

        if let Some(primary) = self.primary {
            let dispatcher = Dispatcher::new(Arc::clone(&pending))
                .with_handler(self.handler)
                .with_policies(
                    config.handler_failure,
                    config.unmatched,
                    config.envelope_check,
                )
                .with_failure_channel(failures_tx);
            let consumer = PrimaryConsumer::new(dispatcher, config.max_frame_bytes);
            endpoint.attach(StreamKind::Primary, primary, Some(Box::new(consumer)));
        } else {
            warn!("rpc client: no primary stream attached, replies can never arrive");
            pending.close();
        }

        if let Some(diagnostic) = self.diagnostic {
            let sink = self.diagnostic_sink.unwrap_or_else(DiagnosticSink::stderr);
            endpoint.attach(StreamKind::Diagnostic, diagnostic, Some(Box::new(sink)));
        }

        let readers = endpoint.run();
        info!(streams = readers.len(), "rpc client: started");

        Ok(Client {
            endpoint,
            pending,
            request_timeout: config.request_timeout(),
            readers: Mutex::new(readers),
            failures: Mutex::new(Some(failures_rx)),
        })
    }
}

/// JSON-RPC client bound to one peer.
pub struct Client {
    endpoint: Endpoint,
    pending: Arc<PendingRequests>,
    request_timeout: Option<Duration>,
    readers: Mutex<Vec<(StreamKind, JoinHandle<ReaderExit>)>>,
    failures: Mutex<Option<mpsc::Receiver<HandlerFailure>>>,
}

impl Client {
    /// Start building a client that writes to `outbound`.
    pub fn builder<W>(outbound: W) -> ClientBuilder
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        ClientBuilder::new(outbound)
    }

    /// Send a request and wait for its reply.
    ///
    /// Applies the configured default timeout, if any. The reply is returned
    /// as-is: a peer-side failure is data in [`Response::error`], not an `Err`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Transport`] if the frame cannot be written.
    /// - [`RpcError::Closed`] if the primary stream is or becomes closed.
    /// - [`RpcError::Timeout`] if a default timeout is configured and elapses.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Response> {
        match self.request_timeout {
            Some(timeout) => self.request_with_timeout(method, params, timeout).await,
            None => self.call(method, params.as_ref()).await,
        }
    }

    /// Send a request and wait at most `timeout` for its reply.
    ///
    /// On timeout the pending entry is removed; a late reply then reaches the
    /// handler like any unclaimed message.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`RpcError::Timeout`].
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Response> {
        tokio::time::timeout(timeout, self.call(method, params.as_ref()))
            .await
            .unwrap_or_else(|_| {
                warn!(method, ?timeout, "rpc client: request timed out");
                Err(RpcError::Timeout(format!(
                    "no reply to {method} within {timeout:?}"
                )))
            })
    }

    /// Send a request and wait for its reply until `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`RpcError::Cancelled`].
    pub async fn request_with_cancel(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(method, "rpc client: request cancelled");
                Err(RpcError::Cancelled(format!("request {method} cancelled")))
            }

            result = self.call(method, params.as_ref()) => result,
        }
    }

    /// Send a request without waiting; its reply goes to the handler.
    ///
    /// Returns the correlation ID assigned to the request.
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] if the frame cannot be written.
    pub async fn request_async(&self, method: &str, params: Option<Value>) -> Result<i64> {
        let (id, frame) = encode_request(method, params.as_ref())?;
        debug!(id, method, "rpc client: sending request without waiter");
        self.endpoint.input(&frame).await?;
        Ok(id)
    }

    /// Send a notification (no ID, no reply).
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] if the frame cannot be written.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let frame = encode_notification(method, params.as_ref())?;
        debug!(method, "rpc client: sending notification");
        self.endpoint.input(&frame).await
    }

    /// Take the receiver of isolated handler failures.
    ///
    /// Returns `None` after the first call. Failures reported while nobody
    /// holds the receiver are dropped once the channel fills up.
    pub fn take_handler_failures(&self) -> Option<mpsc::Receiver<HandlerFailure>> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Whether replies can still arrive on the primary stream.
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        !self.pending.is_closed()
    }

    /// Stop the read loops and wait for them to finish.
    ///
    /// Pending requests fail with [`RpcError::Closed`]. The outbound stream is
    /// left open. Returns each loop's exit reason; a second call returns an
    /// empty list.
    pub async fn shutdown(&self) -> Vec<(StreamKind, ReaderExit)> {
        self.endpoint.shutdown();

        let readers: Vec<_> = self
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = readers.into_iter().unzip();
        let exits = join_all(handles).await;

        kinds
            .into_iter()
            .zip(exits)
            .map(|(kind, exit)| {
                let exit = exit.unwrap_or_else(|e| {
                    warn!(stream = %kind, error = %e, "rpc client: read loop task failed");
                    ReaderExit::ConsumerFailed(format!("read loop task failed: {e}"))
                });
                (kind, exit)
            })
            .collect()
    }

    async fn call(&self, method: &str, params: Option<&Value>) -> Result<Response> {
        let (id, frame) = encode_request(method, params)?;
        let reply = self.pending.register(id)?;
        let _guard = PendingGuard::new(&self.pending, id);

        debug!(id, method, "rpc client: sending request");
        self.endpoint.input(&frame).await?;

        reply.await.map_err(|_| {
            RpcError::Closed(format!(
                "primary stream closed before reply to request {id} ({method})"
            ))
        })
    }
}
