//! Interactive pass-through between the terminal and the socket
//!
//! Each turn of the loop races three sources on one cooperative thread:
//! the socket, the next terminal line and the operator's interrupt. The first
//! to complete is handled and the others are dropped. Every source is
//! cancel-safe, so a dropped read never consumes data that a later turn
//! would expect to see.
//!
//! Terminal lines come from a dedicated blocking reader thread over a
//! channel, keeping stdin off the scheduler.

use std::future::Future;
use std::io::BufRead;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::connection::Connection;
use crate::echo::Direction;
use crate::error::{Error, Result};

/// Socket read size per turn
const CHUNK_SIZE: usize = 4096;

/// Buffered terminal lines not yet sent
const LINE_QUEUE: usize = 16;

pub const ENTER_NOTICE: &str = "[*] Entering interactive mode. Press CTRL+C to exit.\n";
pub const REMOTE_CLOSED_NOTICE: &str = "\n[*] Connection closed by remote host.\n";
pub const INTERRUPTED_NOTICE: &str = "\n[*] Exiting interactive mode.\n";

/// Why interactive mode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveExit {
    /// The peer closed the stream
    RemoteClosed,
    /// The operator pressed Ctrl-C
    Interrupted,
}

enum Event {
    Remote(std::io::Result<usize>),
    Line(Option<Vec<u8>>),
    Interrupt,
}

impl Connection {
    /// Hand the terminal to the remote peer until it closes or Ctrl-C.
    ///
    /// Runs its own single-threaded runtime, so it must not be called from
    /// inside an async context; use [`Connection::interact`] there. The
    /// connection is closed when this returns.
    pub fn interactive(&mut self) -> Result<InteractiveExit> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        let lines = spawn_stdin_reader();
        runtime.block_on(self.interact(lines, tokio::io::stdout(), ctrl_c()))
    }

    /// Relay between `lines`/`output` and the socket until the peer closes or
    /// `interrupt` completes. The connection is closed on every exit path.
    pub async fn interact<W, F>(
        &mut self,
        mut lines: mpsc::Receiver<Vec<u8>>,
        mut output: W,
        interrupt: F,
    ) -> Result<InteractiveExit>
    where
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let result = self.relay(&mut lines, &mut output, interrupt).await;
        self.close();

        match &result {
            Ok(exit) => info!(?exit, "Left interactive mode"),
            Err(e) => debug!(error = %e, "Interactive mode failed"),
        }
        result
    }

    async fn relay<W, F>(
        &mut self,
        lines: &mut mpsc::Receiver<Vec<u8>>,
        output: &mut W,
        interrupt: F,
    ) -> Result<InteractiveExit>
    where
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let std_stream = self.stream()?.try_clone()?;
        std_stream.set_nonblocking(true)?;
        let mut socket = TcpStream::from_std(std_stream)?;

        write_flush(output, ENTER_NOTICE.as_bytes()).await?;
        info!(host = %self.host(), port = self.port(), "Entering interactive mode");

        tokio::pin!(interrupt);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut decoder = LossyDecoder::default();
        let mut input_open = true;

        loop {
            let event = tokio::select! {
                read = socket.read(&mut buf) => Event::Remote(read),
                line = lines.recv(), if input_open => Event::Line(line),
                () = &mut interrupt => Event::Interrupt,
            };

            match event {
                Event::Remote(Ok(0)) => {
                    let tail = decoder.finish();
                    write_flush(output, tail.as_bytes()).await?;
                    write_flush(output, REMOTE_CLOSED_NOTICE.as_bytes()).await?;
                    return Ok(InteractiveExit::RemoteClosed);
                }
                Event::Remote(Ok(n)) => {
                    self.echo(Direction::Recv, &buf[..n]);
                    let text = decoder.decode(&buf[..n]);
                    write_flush(output, text.as_bytes()).await?;
                }
                Event::Remote(Err(e)) => return Err(Error::Io(e)),
                Event::Line(Some(line)) => {
                    if !line.is_empty() {
                        self.send_async(&mut socket, &line).await?;
                    }
                }
                Event::Line(None) => {
                    debug!("Terminal input closed");
                    input_open = false;
                }
                Event::Interrupt => {
                    write_flush(output, INTERRUPTED_NOTICE.as_bytes()).await?;
                    return Ok(InteractiveExit::Interrupted);
                }
            }
        }
    }

    async fn send_async(&self, socket: &mut TcpStream, data: &[u8]) -> Result<()> {
        self.echo(Direction::Send, data);
        tokio::time::timeout(self.timeout, socket.write_all(data))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::from_socket)?;
        trace!(bytes = data.len(), "Sent");
        Ok(())
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(output: &mut W, data: &[u8]) -> Result<()> {
    if !data.is_empty() {
        output.write_all(data).await?;
    }
    output.flush().await?;
    Ok(())
}

/// Completes on Ctrl-C; never completes if the signal can't be watched
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Forward stdin lines, newline included, until EOF or the receiver is gone.
///
/// The thread stays parked in `read` after interactive mode ends and exits
/// on the next line or EOF.
fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(LINE_QUEUE);
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        loop {
            let mut line = Vec::new();
            match stdin.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Terminal read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// UTF-8 decoder that replaces invalid bytes but carries a multi-byte
/// sequence split across chunk boundaries over to the next chunk
#[derive(Debug, Default)]
struct LossyDecoder {
    pending: Vec<u8>,
}

impl LossyDecoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let split = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let width = match bytes[i] {
            0x80..=0xBF => continue,
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        let have = bytes.len() - i;
        return if have < width { have } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpuppet_core::RemoteOptions;
    use std::io::{BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn serve<T, F>(peer: F) -> (u16, JoinHandle<T>)
    where
        T: Send + 'static,
        F: FnOnce(std::net::TcpStream) -> T + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            peer(stream)
        });
        (port, handle)
    }

    fn connect(port: u16) -> Connection {
        let options = RemoteOptions::default().with_timeout(Duration::from_secs(2));
        Connection::connect("127.0.0.1", port, options).unwrap()
    }

    #[tokio::test]
    async fn test_remote_output_shown_once() {
        let (port, peer) = serve(|mut stream| {
            stream.write_all(b"ready\n").unwrap();
            thread::sleep(Duration::from_millis(300));
        });

        let mut conn = connect(port);
        let (_tx, rx) = mpsc::channel(1);
        let mut out = Vec::new();

        let exit = conn
            .interact(rx, &mut out, std::future::pending())
            .await
            .unwrap();
        peer.join().unwrap();

        assert_eq!(exit, InteractiveExit::RemoteClosed);
        assert!(conn.is_closed());
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("ready").count(), 1);
        assert_eq!(
            text,
            format!("{}ready\n{}", ENTER_NOTICE, REMOTE_CLOSED_NOTICE)
        );
    }

    #[tokio::test]
    async fn test_terminal_line_reaches_peer() {
        let (port, peer) = serve(|stream| {
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            std::io::BufRead::read_line(&mut reader, &mut line).unwrap();
            (&stream).write_all(b"root\n").unwrap();
            line
        });

        let mut conn = connect(port);
        let (tx, rx) = mpsc::channel(1);
        tx.send(b"whoami\n".to_vec()).await.unwrap();
        let mut out = Vec::new();

        let exit = conn
            .interact(rx, &mut out, std::future::pending())
            .await
            .unwrap();

        assert_eq!(exit, InteractiveExit::RemoteClosed);
        assert_eq!(peer.join().unwrap(), "whoami\n");
        assert!(String::from_utf8(out).unwrap().contains("root\n"));
    }

    #[tokio::test]
    async fn test_interrupt_closes_connection() {
        let (port, peer) = serve(|mut stream| {
            let mut rest = Vec::new();
            // Returns once the client side shuts the socket down
            stream.read_to_end(&mut rest).unwrap();
            rest
        });

        let mut conn = connect(port);
        let (_tx, rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut out = Vec::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = stop_tx.send(());
        });
        let interrupt = async move {
            let _ = stop_rx.await;
        };

        let exit = conn.interact(rx, &mut out, interrupt).await.unwrap();

        assert_eq!(exit, InteractiveExit::Interrupted);
        assert!(conn.is_closed());
        assert!(peer.join().unwrap().is_empty());
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with(INTERRUPTED_NOTICE));
        assert!(!text.contains(REMOTE_CLOSED_NOTICE));
    }

    #[tokio::test]
    async fn test_relay_continues_after_terminal_eof() {
        let (port, peer) = serve(|mut stream| {
            thread::sleep(Duration::from_millis(100));
            stream.write_all(b"late\n").unwrap();
        });

        let mut conn = connect(port);
        let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
        drop(tx);
        let mut out = Vec::new();

        let exit = conn
            .interact(rx, &mut out, std::future::pending())
            .await
            .unwrap();
        peer.join().unwrap();

        assert_eq!(exit, InteractiveExit::RemoteClosed);
        assert!(String::from_utf8(out).unwrap().contains("late\n"));
    }

    #[tokio::test]
    async fn test_interact_on_closed_connection() {
        let (port, peer) = serve(|_stream| ());
        let mut conn = connect(port);
        conn.close();
        peer.join().unwrap();

        let (_tx, rx) = mpsc::channel(1);
        let result = conn
            .interact(rx, Vec::new(), std::future::pending())
            .await;
        assert!(matches!(result, Err(Error::Closed)));
    }

    #[test]
    fn test_decoder_joins_split_sequence() {
        let mut decoder = LossyDecoder::default();
        // "é" is C3 A9
        assert_eq!(decoder.decode(b"caf\xc3"), "caf");
        assert_eq!(decoder.decode(b"\xa9!"), "é!");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = LossyDecoder::default();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
        // Truncated sequence at EOF is replaced, not dropped
        assert_eq!(decoder.decode(b"x\xe2\x82"), "x");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }

    #[test]
    fn test_incomplete_tail() {
        assert_eq!(incomplete_tail(b"abc"), 0);
        assert_eq!(incomplete_tail(b"\xe2\x82\xac"), 0);
        assert_eq!(incomplete_tail(b"a\xe2\x82"), 2);
        assert_eq!(incomplete_tail(b"a\xf0"), 1);
        assert_eq!(incomplete_tail(b""), 0);
    }
}
