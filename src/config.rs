//! Client configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Result, RpcError};

/// What to do when the response handler returns an error.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerFailurePolicy {
    /// Log the failure, report it on the side channel, keep reading.
    #[default]
    Isolate,
    /// Propagate the failure and terminate the primary read loop.
    FailFast,
}

/// What to do with a message that matches no waiting request when no
/// handler is configured.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Discard silently.
    #[default]
    Drop,
    /// Discard and emit a `debug` event.
    Log,
    /// Treat as fatal to the primary read loop.
    Error,
}

/// Validation applied to decoded responses that must carry exactly one of
/// `result` / `error`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeCheck {
    /// Accept the envelope as-is.
    #[default]
    Ignore,
    /// Accept it but emit a `warn` event.
    Warn,
    /// Reject it as a payload error, terminating the primary read loop.
    Reject,
}

fn default_read_chunk_bytes() -> usize {
    4096
}

fn default_max_frame_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_failure_channel_capacity() -> usize {
    64
}

/// Client configuration, typically parsed from a TOML file.
///
/// Every key is optional; missing keys take their defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ClientConfig {
    /// Bytes requested from an inbound stream per read.
    pub read_chunk_bytes: usize,
    /// Largest `Content-Length` accepted on the primary stream.
    pub max_frame_bytes: usize,
    /// Default timeout applied by `Client::request`; 0 means wait forever.
    pub request_timeout_seconds: u64,
    /// Response handler failure policy.
    pub handler_failure: HandlerFailurePolicy,
    /// Policy for messages nobody is waiting for when no handler is set.
    pub unmatched: UnmatchedPolicy,
    /// Result/error exclusivity check on decoded responses.
    pub envelope_check: EnvelopeCheck,
    /// Bound of the channel carrying isolated handler failures.
    pub failure_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_chunk_bytes: default_read_chunk_bytes(),
            max_frame_bytes: default_max_frame_bytes(),
            request_timeout_seconds: 0,
            handler_failure: HandlerFailurePolicy::default(),
            unmatched: UnmatchedPolicy::default(),
            envelope_check: EnvelopeCheck::default(),
            failure_channel_capacity: default_failure_channel_capacity(),
        }
    }
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| RpcError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Default request timeout, or `None` when requests wait forever.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_bytes == 0 {
            return Err(RpcError::Config(
                "read_chunk_bytes must be greater than zero".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(RpcError::Config(
                "max_frame_bytes must be greater than zero".into(),
            ));
        }
        if self.failure_channel_capacity == 0 {
            return Err(RpcError::Config(
                "failure_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
