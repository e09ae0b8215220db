//! JSON-RPC layer on top of the stream [`Endpoint`](crate::endpoint::Endpoint).
//!
//! - `envelope`: request / notification / response shapes and ID issuance.
//! - `framing`: `Content-Length` encoding and incremental decoding.
//! - `correlation`: per-request rendezvous channels keyed by ID.
//! - `dispatch`: routing of decoded messages; the primary-stream consumer.
//! - `diagnostic`: pass-through consumer for the diagnostic stream.
//! - `client`: the [`Client`] API and its builder.

pub mod client;
pub mod correlation;
pub mod diagnostic;
pub mod dispatch;
pub mod envelope;
pub mod framing;

pub use client::{Client, ClientBuilder};
pub use diagnostic::DiagnosticSink;
pub use dispatch::{handler_fn, HandlerFailure, ResponseHandler};
pub use envelope::{Response, ResponseError};
