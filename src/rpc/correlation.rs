//! Request/response correlation.
//!
//! Every in-flight request owns a dedicated [`oneshot`] channel, keyed by
//! its correlation ID in a mutex-guarded map. The read loop resolves entries
//! as replies arrive; callers remove their own entry when they stop waiting
//! (timeout, cancellation, or the request future being dropped).
//!
//! Once the primary stream closes the map is closed too: pending waiters
//! observe a dropped sender and new registrations are refused.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::trace;

use crate::rpc::envelope::Response;
use crate::{Result, RpcError};

/// Outcome of offering a decoded message to the pending map.
#[derive(Debug)]
pub enum Resolution {
    /// The message was handed to the waiting caller.
    Delivered,
    /// Nobody is waiting for it; the message is returned untouched.
    Unmatched(Response),
}

#[derive(Debug, Default)]
struct PendingState {
    waiters: HashMap<i64, oneshot::Sender<Response>>,
    closed: bool,
}

/// Map of correlation ID to the rendezvous channel of its waiting caller.
#[derive(Debug, Default)]
pub struct PendingRequests {
    state: Mutex<PendingState>,
}

impl PendingRequests {
    /// Create an empty, open map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `id` and return its receiving end.
    ///
    /// Registering an ID twice replaces the earlier waiter, whose receiver
    /// then resolves with an error.
    ///
    /// # Errors
    ///
    /// [`RpcError::Closed`] once the primary stream has closed.
    pub fn register(&self, id: i64) -> Result<oneshot::Receiver<Response>> {
        let mut state = self.lock();
        if state.closed {
            return Err(RpcError::Closed(format!(
                "primary stream closed, cannot wait for request {id}"
            )));
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        trace!(id, pending = state.waiters.len(), "rpc correlation: waiter registered");
        Ok(rx)
    }

    /// Hand `response` to the caller waiting for its ID, if any.
    ///
    /// Messages that carry a `method` are peer-initiated and never resolve
    /// a waiter, even when their numeric ID collides with one.
    pub fn resolve(&self, response: Response) -> Resolution {
        let Some(id) = response.id.filter(|_| response.is_reply()) else {
            return Resolution::Unmatched(response);
        };

        let Some(tx) = self.lock().waiters.remove(&id) else {
            return Resolution::Unmatched(response);
        };

        match tx.send(response) {
            Ok(()) => {
                trace!(id, "rpc correlation: reply delivered");
                Resolution::Delivered
            }
            // The caller gave up between lookup and send.
            Err(response) => Resolution::Unmatched(response),
        }
    }

    /// Drop the waiter for `id`. Returns whether one was registered.
    pub fn forget(&self, id: i64) -> bool {
        self.lock().waiters.remove(&id).is_some()
    }

    /// Fail every pending waiter and refuse new ones.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.waiters.len();
        state.waiters.clear();
        trace!(dropped, "rpc correlation: closed");
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Whether no request is awaiting a reply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes a waiter from the map when the waiting call goes away.
///
/// Held by a request future across its await point so timeouts,
/// cancellation and plain drops all clean up the entry.
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    id: i64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingRequests, id: i64) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.forget(self.id) {
            trace!(id = self.id, "rpc correlation: abandoned waiter removed");
        }
    }
}
