//! Routing of decoded messages from the primary stream.
//!
//! | Message                                   | Goes to                              |
//! |-------------------------------------------|--------------------------------------|
//! | reply whose ID has a waiting caller       | that caller's rendezvous channel     |
//! | anything else, handler configured         | [`ResponseHandler::handle`]          |
//! | anything else, no handler                 | [`UnmatchedPolicy`]                  |

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::{EnvelopeCheck, HandlerFailurePolicy, UnmatchedPolicy};
use crate::endpoint::StreamConsumer;
use crate::rpc::correlation::{PendingRequests, Resolution};
use crate::rpc::envelope::Response;
use crate::rpc::framing::decode_frames;
use crate::{Result, RpcError};

/// Receives messages that no waiting request claimed: peer notifications,
/// peer-initiated requests, and replies to `request_async` calls.
///
/// Runs inline on the primary read task, so a slow handler delays every
/// later frame.
pub trait ResponseHandler: Send + Sync {
    /// Handle one unclaimed message.
    ///
    /// # Errors
    ///
    /// An error is isolated or fatal depending on [`HandlerFailurePolicy`].
    fn handle(&self, response: Response) -> Result<()>;
}

/// Adapter turning a closure into a [`ResponseHandler`].
pub struct FnHandler<F>(F);

impl<F> ResponseHandler for FnHandler<F>
where
    F: Fn(Response) -> Result<()> + Send + Sync,
{
    fn handle(&self, response: Response) -> Result<()> {
        (self.0)(response)
    }
}

/// Wrap a closure as a shareable [`ResponseHandler`].
#[must_use]
pub fn handler_fn<F>(f: F) -> Arc<dyn ResponseHandler>
where
    F: Fn(Response) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// A handler failure that was isolated instead of stopping the read loop.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    /// ID of the message the handler rejected, if it had one.
    pub id: Option<i64>,
    /// Method of the message the handler rejected, if it had one.
    pub method: Option<String>,
    /// The handler's error.
    pub error: RpcError,
}

/// Routes decoded messages to waiters, the handler, or the unmatched policy.
pub struct Dispatcher {
    pending: Arc<PendingRequests>,
    handler: Option<Arc<dyn ResponseHandler>>,
    handler_failure: HandlerFailurePolicy,
    unmatched: UnmatchedPolicy,
    envelope_check: EnvelopeCheck,
    failures: Option<mpsc::Sender<HandlerFailure>>,
}

impl Dispatcher {
    /// Create a dispatcher resolving against `pending`, with default policies
    /// and no handler.
    #[must_use]
    pub fn new(pending: Arc<PendingRequests>) -> Self {
        Self {
            pending,
            handler: None,
            handler_failure: HandlerFailurePolicy::default(),
            unmatched: UnmatchedPolicy::default(),
            envelope_check: EnvelopeCheck::default(),
            failures: None,
        }
    }

    /// Set the handler for unclaimed messages.
    #[must_use]
    pub fn with_handler(mut self, handler: Option<Arc<dyn ResponseHandler>>) -> Self {
        self.handler = handler;
        self
    }

    /// Set the three dispatch policies.
    #[must_use]
    pub fn with_policies(
        mut self,
        handler_failure: HandlerFailurePolicy,
        unmatched: UnmatchedPolicy,
        envelope_check: EnvelopeCheck,
    ) -> Self {
        self.handler_failure = handler_failure;
        self.unmatched = unmatched;
        self.envelope_check = envelope_check;
        self
    }

    /// Set the side channel that receives isolated handler failures.
    #[must_use]
    pub fn with_failure_channel(mut self, failures: mpsc::Sender<HandlerFailure>) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Route one decoded message.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Payload`] when `envelope_check` is `reject` and the reply
    ///   does not carry exactly one of `result` / `error`.
    /// - [`RpcError::Handler`] (or the handler's own error) under `fail_fast`.
    /// - [`RpcError::Unmatched`] when nothing claims the message and the
    ///   unmatched policy is `error`.
    pub fn dispatch(&self, response: Response) -> Result<()> {
        self.check_envelope(&response)?;

        let response = match self.pending.resolve(response) {
            Resolution::Delivered => return Ok(()),
            Resolution::Unmatched(response) => response,
        };

        if let Some(handler) = &self.handler {
            return self.call_handler(handler.as_ref(), response);
        }

        match self.unmatched {
            UnmatchedPolicy::Drop => {
                trace!(id = ?response.id, "rpc dispatch: unmatched message dropped");
                Ok(())
            }
            UnmatchedPolicy::Log => {
                debug!(
                    id = ?response.id,
                    method = ?response.method,
                    "rpc dispatch: unmatched message dropped"
                );
                Ok(())
            }
            UnmatchedPolicy::Error => Err(RpcError::Unmatched(format!(
                "no waiter or handler for message id={:?} method={:?}",
                response.id, response.method
            ))),
        }
    }

    fn check_envelope(&self, response: &Response) -> Result<()> {
        if !response.is_reply() || response.has_single_outcome() {
            return Ok(());
        }
        match self.envelope_check {
            EnvelopeCheck::Ignore => Ok(()),
            EnvelopeCheck::Warn => {
                warn!(
                    id = ?response.id,
                    "rpc dispatch: reply must carry exactly one of result or error"
                );
                Ok(())
            }
            EnvelopeCheck::Reject => Err(RpcError::Payload(format!(
                "reply {:?} must carry exactly one of result or error",
                response.id
            ))),
        }
    }

    fn call_handler(&self, handler: &dyn ResponseHandler, response: Response) -> Result<()> {
        let id = response.id;
        let method = response.method.clone();

        let Err(error) = handler.handle(response) else {
            return Ok(());
        };

        match self.handler_failure {
            HandlerFailurePolicy::FailFast => Err(error),
            HandlerFailurePolicy::Isolate => {
                warn!(?id, ?method, %error, "rpc dispatch: handler failed, continuing");
                if let Some(failures) = &self.failures {
                    let report = HandlerFailure { id, method, error };
                    if failures.try_send(report).is_err() {
                        debug!("rpc dispatch: failure channel full or closed, report dropped");
                    }
                }
                Ok(())
            }
        }
    }
}

/// [`StreamConsumer`] for the primary stream: decodes frames and dispatches
/// each one, closing the pending map when the stream ends.
pub struct PrimaryConsumer {
    dispatcher: Dispatcher,
    max_frame_bytes: usize,
}

impl PrimaryConsumer {
    /// Create a consumer that rejects frames larger than `max_frame_bytes`.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, max_frame_bytes: usize) -> Self {
        Self {
            dispatcher,
            max_frame_bytes,
        }
    }
}

impl StreamConsumer for PrimaryConsumer {
    fn consume(&mut self, data: &[u8]) -> Result<usize> {
        let dispatcher = &self.dispatcher;
        decode_frames(data, self.max_frame_bytes, |response| {
            dispatcher.dispatch(response)
        })
    }

    fn on_close(&mut self) {
        debug!("rpc dispatch: primary stream ended, failing pending requests");
        self.dispatcher.pending.close();
    }
}
