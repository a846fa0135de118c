//! Blocking TCP connection with delimiter-scanning receive primitives
//!
//! All operations block the calling thread and share one timeout, set at
//! construction. `recvuntil`/`recvline` return whatever arrived if the timeout
//! elapses or the peer closes before the delimiter shows up; callers that need
//! the delimiter must check for it themselves.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use netpuppet_core::RemoteOptions;
use tracing::{debug, info, trace};

use crate::echo::{Direction, EchoSink};
use crate::error::{is_timeout, Error, Result};

/// Default read size for [`Connection::recv_default`]
pub const DEFAULT_RECV_SIZE: usize = 1024;

/// One live TCP stream to a remote service
#[derive(Debug)]
pub struct Connection {
    host: String,
    port: u16,
    pub(crate) timeout: Duration,
    debug: bool,
    echo_sink: EchoSink,
    pub(crate) stream: Option<TcpStream>,
}

impl Connection {
    /// Connect to `host:port`, trying every resolved address in turn.
    ///
    /// The options' timeout bounds the handshake and is then applied to every
    /// read and write on the socket.
    pub fn connect(host: impl Into<String>, port: u16, options: RemoteOptions) -> Result<Self> {
        let host = host.into();
        info!(host = %host, port = port, "Connecting");

        let addr = format!("{}:{}", host, port);
        let stream = open_stream(&host, port, options.timeout)
            .and_then(|stream| {
                stream.set_read_timeout(Some(options.timeout))?;
                stream.set_write_timeout(Some(options.timeout))?;
                Ok(stream)
            })
            .map_err(|source| Error::Connect { addr, source })?;

        debug!(host = %host, port = port, "Connected");

        Ok(Self {
            host,
            port,
            timeout: options.timeout,
            debug: options.debug,
            echo_sink: EchoSink::default(),
            stream: Some(stream),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Toggle mirroring of raw traffic to the echo sink
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Redirect debug echo (stderr by default)
    pub fn set_echo_sink(&mut self, sink: EchoSink) {
        self.echo_sink = sink;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream()?.peer_addr()?)
    }

    /// Write all of `data`. Text is sent as its UTF-8 bytes.
    pub fn send(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        let mut stream = self.stream()?;
        self.echo(Direction::Send, data);

        stream.write_all(data).map_err(Error::from_socket)?;
        stream.flush().map_err(Error::from_socket)?;

        trace!(bytes = data.len(), "Sent");
        Ok(())
    }

    /// `send` with one trailing newline byte
    pub fn sendline(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        let mut line = Vec::with_capacity(data.len() + 1);
        line.extend_from_slice(data);
        line.push(b'\n');
        self.send(line)
    }

    /// Wait for `delim`, then send
    pub fn sendafter(&mut self, delim: impl AsRef<[u8]>, data: impl AsRef<[u8]>) -> Result<()> {
        self.recvuntil(delim, false)?;
        self.send(data)
    }

    /// Wait for `delim`, then send a line
    pub fn sendlineafter(
        &mut self,
        delim: impl AsRef<[u8]>,
        data: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.recvuntil(delim, false)?;
        self.sendline(data)
    }

    /// Single read of at most `max_size` bytes.
    ///
    /// An empty result means the peer closed the stream. A read that sees no
    /// data within the timeout fails with [`Error::Timeout`].
    pub fn recv(&mut self, max_size: usize) -> Result<Vec<u8>> {
        let mut stream = self.stream()?;
        let mut buf = vec![0u8; max_size];

        let n = loop {
            match stream.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_socket(e)),
            }
        };
        buf.truncate(n);

        self.echo(Direction::Recv, &buf);
        trace!(bytes = n, "Received");
        Ok(buf)
    }

    /// `recv` with the default read size
    pub fn recv_default(&mut self) -> Result<Vec<u8>> {
        self.recv(DEFAULT_RECV_SIZE)
    }

    /// Read one byte at a time until the buffer ends with `delim`.
    ///
    /// Timeout and EOF end the scan early and return the partial buffer.
    /// With `drop`, a matched delimiter is stripped from the result.
    pub fn recvuntil(&mut self, delim: impl AsRef<[u8]>, drop: bool) -> Result<Vec<u8>> {
        let delim = delim.as_ref();
        let mut stream = self.stream()?;
        let mut data = Vec::new();
        let mut byte = [0u8; 1];

        while !data.ends_with(delim) {
            match stream.read(&mut byte) {
                Ok(0) => {
                    debug!(bytes = data.len(), "Peer closed before delimiter");
                    break;
                }
                Ok(_) => data.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => {
                    debug!(bytes = data.len(), "Timed out waiting for delimiter");
                    break;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        self.echo(Direction::Recv, &data);

        if drop && data.ends_with(delim) {
            data.truncate(data.len() - delim.len());
        }
        Ok(data)
    }

    /// `recvuntil` a newline
    pub fn recvline(&mut self, drop_newline: bool) -> Result<Vec<u8>> {
        self.recvuntil(b"\n", drop_newline)
    }

    /// Release the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; the handle is dropped either way
            let _ = stream.shutdown(Shutdown::Both);
            info!(host = %self.host, port = self.port, "Connection closed");
        }
    }

    pub(crate) fn stream(&self) -> Result<&TcpStream> {
        self.stream.as_ref().ok_or(Error::Closed)
    }

    pub(crate) fn echo(&self, direction: Direction, data: &[u8]) {
        if self.debug {
            self.echo_sink.emit(direction, data);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect with default options
pub fn remote(host: impl Into<String>, port: u16) -> Result<Connection> {
    Connection::connect(host, port, RemoteOptions::default())
}

fn open_stream(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}
