#![forbid(unsafe_code)]

//! JSON-RPC client for peers speaking `Content-Length` framed messages over
//! a pair of byte streams (LSP-style stdio), with a side stream for
//! unstructured diagnostics.

pub mod config;
pub mod endpoint;
pub mod errors;
pub mod peer;
pub mod rpc;

pub use config::ClientConfig;
pub use errors::{Result, RpcError};
pub use rpc::{Client, ClientBuilder, Response, ResponseError};
