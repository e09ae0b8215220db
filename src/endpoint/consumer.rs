//! Pluggable consumers for inbound stream buffers.

use crate::Result;

/// Receives the accumulated buffer of one inbound stream.
///
/// The read loop calls [`consume`](StreamConsumer::consume) with every byte
/// buffered so far after each successful read. The consumer returns how many
/// leading bytes it fully processed (0 when it needs more data); the loop
/// drops exactly that many bytes and keeps the rest for the next call.
///
/// Returning an error terminates the read loop permanently.
pub trait StreamConsumer: Send {
    /// Process the leading bytes of `data`, returning how many were consumed.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the owning read loop.
    fn consume(&mut self, data: &[u8]) -> Result<usize>;

    /// Called once when the owning read loop exits, for any reason.
    fn on_close(&mut self) {}
}

/// Adapter turning a closure into a [`StreamConsumer`].
pub struct FnConsumer<F>(F);

impl<F> StreamConsumer for FnConsumer<F>
where
    F: FnMut(&[u8]) -> Result<usize> + Send,
{
    fn consume(&mut self, data: &[u8]) -> Result<usize> {
        (self.0)(data)
    }
}

/// Wrap a closure as a boxed [`StreamConsumer`].
#[must_use]
pub fn consumer_fn<F>(f: F) -> Box<dyn StreamConsumer>
where
    F: FnMut(&[u8]) -> Result<usize> + Send + 'static,
{
    Box::new(FnConsumer(f))
}
