//! `Content-Length` message framing.
//!
//! # Wire format
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <length bytes of UTF-8 JSON>
//! ```
//!
//! Decoding works on whatever bytes the primary read loop has buffered so
//! far: complete frames are decoded and dispatched in order, a trailing
//! partial frame is left untouched for the next call.

use tracing::trace;

use crate::rpc::envelope::Response;
use crate::{Result, RpcError};

/// Sequence separating the header block from the payload.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Name of the only header this crate reads or writes.
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Largest header block accepted before its terminator must appear.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Prefix `body` with its `Content-Length` header.
#[must_use]
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Position of the first header terminator in `buf`.
#[must_use]
pub fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// Extract the payload length from a header block (terminator excluded).
///
/// Header names are matched case-insensitively; headers other than
/// `Content-Length` are ignored.
///
/// # Errors
///
/// [`RpcError::Framing`] when the block is not UTF-8, a line has no colon,
/// the length is not a non-negative integer, or the header is missing.
pub fn parse_content_length(header: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|e| RpcError::Framing(format!("header is not valid UTF-8: {e}")))?;

    let mut length = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            return Err(RpcError::Framing(format!("malformed header line '{line}'")));
        };
        if key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let value = value.trim();
            let parsed = value.parse::<usize>().map_err(|e| {
                RpcError::Framing(format!("invalid {CONTENT_LENGTH} '{value}': {e}"))
            })?;
            length = Some(parsed);
        }
    }

    length.ok_or_else(|| RpcError::Framing(format!("missing {CONTENT_LENGTH} header")))
}

/// Decode every complete frame at the front of `buf`.
///
/// Each decoded [`Response`] is passed to `on_frame` in wire order. Returns
/// the number of leading bytes covered by the frames decoded; 0 when not
/// even the first frame is complete.
///
/// # Errors
///
/// - [`RpcError::Framing`] for a bad header, a header block longer than
///   [`MAX_HEADER_BYTES`], or a length above `max_frame_bytes`.
/// - [`RpcError::Payload`] when a body is not a JSON envelope.
/// - Whatever `on_frame` returns.
///
/// Any error aborts the whole call; frames dispatched before it stay
/// dispatched.
pub fn decode_frames<F>(buf: &[u8], max_frame_bytes: usize, mut on_frame: F) -> Result<usize>
where
    F: FnMut(Response) -> Result<()>,
{
    let mut consumed = 0;

    loop {
        let rest = &buf[consumed..];

        // The terminator must start within the first MAX_HEADER_BYTES bytes.
        let window = rest.len().min(MAX_HEADER_BYTES + HEADER_TERMINATOR.len());
        let Some(header_end) = find_terminator(&rest[..window]) else {
            if window == MAX_HEADER_BYTES + HEADER_TERMINATOR.len() {
                return Err(RpcError::Framing(format!(
                    "header exceeds {MAX_HEADER_BYTES} bytes without a terminator"
                )));
            }
            return Ok(consumed);
        };

        let length = parse_content_length(&rest[..header_end])?;
        if length > max_frame_bytes {
            return Err(RpcError::Framing(format!(
                "frame of {length} bytes exceeds maximum {max_frame_bytes}"
            )));
        }

        let body_start = header_end + HEADER_TERMINATOR.len();
        if rest.len() - body_start < length {
            trace!(
                needed = length,
                available = rest.len() - body_start,
                "rpc framing: partial frame, waiting for more data"
            );
            return Ok(consumed);
        }

        let body = &rest[body_start..body_start + length];
        let response: Response = serde_json::from_slice(body)
            .map_err(|e| RpcError::Payload(format!("malformed json: {e}")))?;

        on_frame(response)?;
        consumed += body_start + length;
    }
}
