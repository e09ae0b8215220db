//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Error enumeration covering every failure mode of the endpoint and client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Read or write failure on one of the byte streams.
    Transport(String),
    /// Malformed frame header, bad or missing length, or oversized frame.
    Framing(String),
    /// Frame body is not a valid JSON-RPC envelope, or was rejected.
    Payload(String),
    /// The response handler reported a failure.
    Handler(String),
    /// A response matched no waiting request and the policy forbids dropping it.
    Unmatched(String),
    /// The primary stream closed before a response could be delivered.
    Closed(String),
    /// A bounded request did not receive its response in time.
    Timeout(String),
    /// A bounded request was cancelled by its token.
    Cancelled(String),
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Framing(msg) => write!(f, "framing: {msg}"),
            Self::Payload(msg) => write!(f, "payload: {msg}"),
            Self::Handler(msg) => write!(f, "handler: {msg}"),
            Self::Unmatched(msg) => write!(f, "unmatched: {msg}"),
            Self::Closed(msg) => write!(f, "closed: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<toml::de::Error> for RpcError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
