//! Unit tests for `Content-Length` frame decoding.
//!
//! Covers:
//! - a single frame decodes and reports header + 4 + N bytes consumed
//! - a partial frame consumes nothing and completes on a later call
//! - two frames in one buffer dispatch in order in one call
//! - a non-integer length fails with a framing error before any dispatch
//! - an invalid JSON body fails with a payload error
//! - an oversized declared length fails with a framing error

use duplex_rpc::rpc::envelope::Response;
use duplex_rpc::rpc::framing::{decode_frames, encode_frame, MAX_HEADER_BYTES};
use duplex_rpc::RpcError;
use serde_json::json;

const MAX: usize = 1024 * 1024;

fn collect(buf: &[u8]) -> (Result<usize, RpcError>, Vec<Response>) {
    let mut seen = Vec::new();
    let result = decode_frames(buf, MAX, |rsp| {
        seen.push(rsp);
        Ok(())
    });
    (result, seen)
}

#[test]
fn single_frame_reports_exact_consumed_count() {
    let body = br#"{"id":7,"result":{"ok":true}}"#;
    let frame = encode_frame(body);
    let header_len = format!("Content-Length: {}", body.len()).len();

    let (result, seen) = collect(&frame);

    assert_eq!(result, Ok(header_len + 4 + body.len()));
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, Some(7));
    assert_eq!(seen[0].result, Some(json!({"ok": true})));
}

#[test]
fn partial_frame_consumes_nothing_until_complete() {
    let body = br#"{"id":1,"result":"done"}"#;
    let frame = encode_frame(body);
    let cut = frame.len() - 5;

    let (result, seen) = collect(&frame[..cut]);
    assert_eq!(result, Ok(0), "incomplete body must not be consumed");
    assert!(seen.is_empty(), "incomplete frame must not be dispatched");

    // The caller keeps the unconsumed bytes and appends the rest.
    let mut buffer = frame[..cut].to_vec();
    buffer.extend_from_slice(&frame[cut..]);
    let (result, seen) = collect(&buffer);
    assert_eq!(result, Ok(frame.len()));
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].result, Some(json!("done")));
}

#[test]
fn header_without_terminator_consumes_nothing() {
    let (result, seen) = collect(b"Content-Length: 12\r\n");
    assert_eq!(result, Ok(0));
    assert!(seen.is_empty());
}

#[test]
fn two_frames_in_one_buffer_dispatch_in_order() {
    let first = encode_frame(br#"{"id":1,"result":1}"#);
    let second = encode_frame(br#"{"id":2,"result":2}"#);
    let mut buffer = first.clone();
    buffer.extend_from_slice(&second);

    let (result, seen) = collect(&buffer);

    assert_eq!(result, Ok(first.len() + second.len()));
    let ids: Vec<_> = seen.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some(1), Some(2)]);
}

#[test]
fn complete_frame_followed_by_partial_consumes_only_the_first() {
    let first = encode_frame(br#"{"id":1,"result":1}"#);
    let second = encode_frame(br#"{"id":2,"result":2}"#);
    let mut buffer = first.clone();
    buffer.extend_from_slice(&second[..10]);

    let (result, seen) = collect(&buffer);

    assert_eq!(result, Ok(first.len()));
    assert_eq!(seen.len(), 1);
}

#[test]
fn non_integer_length_is_a_framing_error() {
    let mut buffer = b"Content-Length: abc\r\n\r\n{}".to_vec();
    buffer.extend_from_slice(&encode_frame(br#"{"id":1,"result":1}"#));

    let (result, seen) = collect(&buffer);

    match result {
        Err(RpcError::Framing(msg)) => assert!(
            msg.contains("Content-Length"),
            "error must name the header, got: {msg}"
        ),
        other => panic!("expected framing error, got {other:?}"),
    }
    assert!(seen.is_empty(), "no frame after a bad header may be dispatched");
}

#[test]
fn invalid_json_body_is_a_payload_error() {
    let frame = encode_frame(b"not json");
    let (result, _) = collect(&frame);
    assert!(matches!(result, Err(RpcError::Payload(_))), "got {result:?}");
}

#[test]
fn zero_length_body_is_a_payload_error() {
    let (result, _) = collect(b"Content-Length: 0\r\n\r\n");
    assert!(matches!(result, Err(RpcError::Payload(_))), "got {result:?}");
}

#[test]
fn empty_object_body_decodes() {
    let (result, seen) = collect(&encode_frame(b"{}"));
    assert!(result.is_ok());
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, None);
}

#[test]
fn oversized_length_is_rejected_before_buffering_the_body() {
    let buffer = format!("Content-Length: {}\r\n\r\n", MAX + 1);
    let (result, _) = collect(buffer.as_bytes());
    match result {
        Err(RpcError::Framing(msg)) => assert!(msg.contains("exceeds maximum"), "got: {msg}"),
        other => panic!("expected framing error, got {other:?}"),
    }
}

#[test]
fn dispatch_error_aborts_remaining_frames() {
    let mut buffer = encode_frame(br#"{"id":1,"result":1}"#);
    buffer.extend_from_slice(&encode_frame(br#"{"id":2,"result":2}"#));

    let mut calls = 0;
    let result = decode_frames(&buffer, MAX, |_| {
        calls += 1;
        Err(RpcError::Handler("boom".into()))
    });

    assert_eq!(result, Err(RpcError::Handler("boom".into())));
    assert_eq!(calls, 1);
}

#[test]
fn unterminated_header_past_the_cap_is_a_framing_error() {
    let (result, seen) = collect(&vec![b'x'; 1 << 20]);
    match result {
        Err(RpcError::Framing(msg)) => assert!(msg.contains("header exceeds"), "got: {msg}"),
        other => panic!("expected framing error, got {other:?}"),
    }
    assert!(seen.is_empty());
}

#[test]
fn unterminated_header_below_the_cap_waits_for_more() {
    let (result, _) = collect(&vec![b'x'; MAX_HEADER_BYTES]);
    assert_eq!(result, Ok(0));
}

#[test]
fn header_ending_exactly_at_the_cap_is_accepted() {
    let body = br#"{"id":1,"result":1}"#;
    let length_line = format!("Content-Length: {}\r\n", body.len());
    let padding = format!("X-Pad: {}", "p".repeat(MAX_HEADER_BYTES - length_line.len() - 7));
    let header = format!("{length_line}{padding}");
    assert_eq!(header.len(), MAX_HEADER_BYTES);

    let mut frame = format!("{header}\r\n\r\n").into_bytes();
    frame.extend_from_slice(body);

    let (result, seen) = collect(&frame);
    assert_eq!(result, Ok(frame.len()));
    assert_eq!(seen.len(), 1);
}

#[test]
fn cap_applies_after_earlier_complete_frames() {
    let mut buffer = encode_frame(br#"{"id":1,"result":1}"#);
    buffer.extend_from_slice(&vec![b'x'; MAX_HEADER_BYTES + 4]);

    let (result, seen) = collect(&buffer);
    assert!(matches!(result, Err(RpcError::Framing(_))), "got {result:?}");
    assert_eq!(seen.len(), 1, "the complete frame before the garbage is dispatched");
}
