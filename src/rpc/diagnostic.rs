//! Pass-through consumer for the diagnostic stream.

use std::io::Write;

use tracing::{trace, warn};

use crate::endpoint::StreamConsumer;
use crate::{Result, RpcError};

/// Copies diagnostic bytes verbatim to an output sink.
///
/// No framing or parsing is applied: every byte offered is written and
/// reported as consumed.
///
/// Writes are synchronous and run on the diagnostic read task, which holds
/// a tokio worker thread for their duration, so the sink must not block.
/// Standard error and in-memory buffers are fine; a pipe or socket that can
/// stall should be fed through a channel to a dedicated thread instead.
pub struct DiagnosticSink {
    sink: Box<dyn Write + Send>,
}

impl DiagnosticSink {
    /// Forward diagnostic bytes to `sink`, which must not block (see
    /// [`DiagnosticSink`]).
    pub fn new<W>(sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Forward diagnostic bytes to this process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl StreamConsumer for DiagnosticSink {
    fn consume(&mut self, data: &[u8]) -> Result<usize> {
        self.sink
            .write_all(data)
            .and_then(|()| self.sink.flush())
            .map_err(|e| {
                warn!(error = %e, "rpc diagnostic: sink write failed");
                RpcError::Transport(format!("diagnostic sink write failed: {e}"))
            })?;
        trace!(bytes = data.len(), "rpc diagnostic: forwarded");
        Ok(data.len())
    }
}
