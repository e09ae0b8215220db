use std::io::Write;
use std::time::Duration;

use duplex_rpc::config::{EnvelopeCheck, HandlerFailurePolicy, UnmatchedPolicy};
use duplex_rpc::{ClientConfig, RpcError};

#[test]
fn defaults_match_documented_values() {
    let config = ClientConfig::default();
    assert_eq!(config.read_chunk_bytes, 4096);
    assert_eq!(config.max_frame_bytes, 100 * 1024 * 1024);
    assert_eq!(config.request_timeout_seconds, 0);
    assert_eq!(config.handler_failure, HandlerFailurePolicy::Isolate);
    assert_eq!(config.unmatched, UnmatchedPolicy::Drop);
    assert_eq!(config.envelope_check, EnvelopeCheck::Ignore);
    assert_eq!(config.failure_channel_capacity, 64);
    assert_eq!(config.request_timeout(), None);
}

#[test]
fn empty_document_yields_defaults() {
    let config = ClientConfig::from_toml_str("").expect("empty config is valid");
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn full_document_parses_every_key() {
    let raw = r#"
read_chunk_bytes = 512
max_frame_bytes = 65536
request_timeout_seconds = 30
handler_failure = "fail_fast"
unmatched = "log"
envelope_check = "reject"
failure_channel_capacity = 8
"#;
    let config = ClientConfig::from_toml_str(raw).expect("valid config");

    assert_eq!(config.read_chunk_bytes, 512);
    assert_eq!(config.max_frame_bytes, 65536);
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.handler_failure, HandlerFailurePolicy::FailFast);
    assert_eq!(config.unmatched, UnmatchedPolicy::Log);
    assert_eq!(config.envelope_check, EnvelopeCheck::Reject);
    assert_eq!(config.failure_channel_capacity, 8);
}

#[test]
fn unknown_policy_value_is_config_error() {
    let err = ClientConfig::from_toml_str(r#"unmatched = "explode""#).unwrap_err();
    match err {
        RpcError::Config(msg) => assert!(msg.starts_with("invalid config"), "got: {msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn zero_sizes_fail_validation() {
    for (raw, key) in [
        ("read_chunk_bytes = 0", "read_chunk_bytes"),
        ("max_frame_bytes = 0", "max_frame_bytes"),
        ("failure_channel_capacity = 0", "failure_channel_capacity"),
    ] {
        match ClientConfig::from_toml_str(raw) {
            Err(RpcError::Config(msg)) => assert!(msg.contains(key), "got: {msg}"),
            other => panic!("expected validation error for {key}, got {other:?}"),
        }
    }
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "request_timeout_seconds = 5").expect("write config");

    let config = ClientConfig::load_from_path(file.path()).expect("load config");
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
}

#[test]
fn load_from_missing_path_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = ClientConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    match err {
        RpcError::Config(msg) => assert!(msg.contains("failed to read config"), "got: {msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}
