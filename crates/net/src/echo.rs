//! Debug echo of raw traffic
//!
//! Every send/receive on a debug-enabled connection is mirrored as one line:
//! a direction marker followed by the bytes written as an escaped byte
//! string, e.g. `>> b"id\n"`. Bytes are never decoded as text.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Outbound marker
pub const SEND_MARKER: &str = ">>";
/// Inbound marker
pub const RECV_MARKER: &str = "<<";

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

impl Direction {
    pub fn marker(self) -> &'static str {
        match self {
            Direction::Send => SEND_MARKER,
            Direction::Recv => RECV_MARKER,
        }
    }
}

/// Render bytes as an escaped byte-string literal
pub fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 3);
    out.push_str("b\"");
    for &b in data {
        match b {
            b'"' => out.push_str("\\\""),
            b'\'' => out.push('\''),
            _ => out.extend(std::ascii::escape_default(b).map(char::from)),
        }
    }
    out.push('"');
    out
}

/// Format one echo line (without trailing newline)
pub fn format_line(direction: Direction, data: &[u8]) -> String {
    format!("{} {}", direction.marker(), escape_bytes(data))
}

/// Destination for debug echo lines
#[derive(Clone, Default)]
pub enum EchoSink {
    #[default]
    Stderr,
    /// Shared writer, e.g. a log file or an in-memory buffer
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl std::fmt::Debug for EchoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoSink::Stderr => f.write_str("Stderr"),
            EchoSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl EchoSink {
    /// Write one echo line. Echo is best-effort and never fails the transfer.
    pub fn emit(&self, direction: Direction, data: &[u8]) {
        let line = format_line(direction, data);
        let result = match self {
            EchoSink::Stderr => writeln!(io::stderr().lock(), "{line}"),
            EchoSink::Writer(writer) => match writer.lock() {
                Ok(mut w) => writeln!(w, "{line}").and_then(|_| w.flush()),
                Err(_) => Ok(()),
            },
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Debug echo write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_printable() {
        assert_eq!(escape_bytes(b"hello"), r#"b"hello""#);
        assert_eq!(escape_bytes(b""), r#"b"""#);
    }

    #[test]
    fn test_escape_control_and_high_bytes() {
        assert_eq!(escape_bytes(b"a\n\t\r"), r#"b"a\n\t\r""#);
        assert_eq!(escape_bytes(&[0x00, 0x7f, 0xff]), r#"b"\x00\x7f\xff""#);
        assert_eq!(escape_bytes(b"say \"hi\" it's"), r#"b"say \"hi\" it's""#);
        assert_eq!(escape_bytes(b"\\"), r#"b"\\""#);
    }

    #[test]
    fn test_format_line_markers() {
        assert_eq!(format_line(Direction::Send, b"id\n"), r#">> b"id\n""#);
        assert_eq!(format_line(Direction::Recv, b"$ "), r#"<< b"$ ""#);
    }

    #[test]
    fn test_writer_sink_collects_lines() {
        let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = EchoSink::Writer(buf.clone());
        sink.emit(Direction::Send, b"ls\n");
        sink.emit(Direction::Recv, b"flag.txt\n");

        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert_eq!(text, ">> b\"ls\\n\"\n<< b\"flag.txt\\n\"\n");
    }
}
