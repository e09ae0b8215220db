use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use duplex_rpc::endpoint::StreamConsumer;
use duplex_rpc::rpc::DiagnosticSink;
use duplex_rpc::RpcError;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn forwards_bytes_verbatim_and_consumes_all() {
    let buf = SharedBuf::default();
    let mut sink = DiagnosticSink::new(buf.clone());

    // Not UTF-8 and not framed: must pass through untouched.
    let data = b"panic: \xff\xfe oops\nContent-Length: 3\r\n\r\n";
    assert_eq!(sink.consume(data).unwrap(), data.len());
    assert_eq!(sink.consume(b"more").unwrap(), 4);

    let written = buf.0.lock().unwrap().clone();
    let mut expected = data.to_vec();
    expected.extend_from_slice(b"more");
    assert_eq!(written, expected);
}

#[test]
fn sink_failure_is_transport_error() {
    let mut sink = DiagnosticSink::new(BrokenPipe);
    assert!(matches!(sink.consume(b"x"), Err(RpcError::Transport(_))));
}
