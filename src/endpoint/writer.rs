//! Outbound complete-write primitive.

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::endpoint::BoxedWriter;
use crate::{Result, RpcError};

/// Write all of `data` to the outbound stream and flush it.
///
/// The writer lock is held for the whole write so frames from concurrent
/// callers are never interleaved. Partial writes are retried until every
/// byte is accepted; the first error is returned.
///
/// # Errors
///
/// - [`RpcError::Transport`]`("write failed: …")` if the stream rejects bytes.
/// - [`RpcError::Transport`]`("flush failed: …")` if flushing fails.
pub async fn write_all(outbound: &Mutex<BoxedWriter>, data: &[u8]) -> Result<()> {
    let mut out = outbound.lock().await;

    out.write_all(data).await.map_err(|e| {
        warn!(error = %e, "endpoint writer: write failed");
        RpcError::Transport(format!("write failed: {e}"))
    })?;

    out.flush().await.map_err(|e| {
        warn!(error = %e, "endpoint writer: flush failed");
        RpcError::Transport(format!("flush failed: {e}"))
    })?;

    trace!(bytes = data.len(), "endpoint writer: frame written");
    Ok(())
}
