//! JSON-RPC envelopes and correlation ID issuance.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rpc::framing::encode_frame;
use crate::{Result, RpcError};

/// Protocol version tag carried by every outgoing envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Process-wide correlation ID counter; the first ID issued is 0.
static NEXT_ID: AtomicI64 = AtomicI64::new(0);

/// Issue a correlation ID unique for the lifetime of the process.
///
/// Shared by every client so IDs never collide even when several clients
/// talk to the same peer.
#[must_use]
pub fn next_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outgoing request envelope.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Correlation ID.
    pub id: i64,
    /// Method name.
    pub method: &'a str,
    /// Parameters; serialized as `null` when absent.
    pub params: Option<&'a Value>,
}

/// Outgoing notification envelope (no correlation ID).
#[derive(Debug, Serialize)]
pub struct NotificationEnvelope<'a> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'a str,
    /// Parameters; serialized as `null` when absent.
    pub params: Option<&'a Value>,
}

/// The `error` object of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Numeric error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A decoded inbound message.
///
/// Responses carry `id` plus one of `result` / `error`. Messages the peer
/// initiates on its own also carry `method` (and usually `params`); those
/// are never matched to a waiting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation ID, absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Result payload. `Some(Value::Null)` when the peer sent `"result": null`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    /// Method name of a peer-initiated message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Parameters of a peer-initiated message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Response {
    /// Whether this message answers a request: it has an ID and no method.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.id.is_some() && self.method.is_none()
    }

    /// Whether exactly one of `result` / `error` is present.
    #[must_use]
    pub fn has_single_outcome(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }

    /// Split into the result payload or the peer's error object.
    ///
    /// An absent result maps to `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns the peer's [`ResponseError`] when one is present.
    pub fn into_result(self) -> std::result::Result<Value, ResponseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Keep an explicit JSON `null` as `Some(Value::Null)`; a missing key falls
/// back to `None` through `#[serde(default)]`.
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Build a framed request, returning its freshly issued ID and the bytes.
///
/// # Errors
///
/// Returns [`RpcError::Payload`] if the envelope cannot be serialized.
pub fn encode_request(method: &str, params: Option<&Value>) -> Result<(i64, Vec<u8>)> {
    let id = next_id();
    let body = serde_json::to_vec(&RequestEnvelope {
        jsonrpc: JSONRPC_VERSION,
        id,
        method,
        params,
    })
    .map_err(|e| RpcError::Payload(format!("failed to serialise request {method}: {e}")))?;

    Ok((id, encode_frame(&body)))
}

/// Build a framed notification.
///
/// # Errors
///
/// Returns [`RpcError::Payload`] if the envelope cannot be serialized.
pub fn encode_notification(method: &str, params: Option<&Value>) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&NotificationEnvelope {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })
    .map_err(|e| RpcError::Payload(format!("failed to serialise notification {method}: {e}")))?;

    Ok(encode_frame(&body))
}
