//! Netpuppet Network Library
//!
//! Scripted interaction with a single TCP service.
//!
//! # Architecture
//!
//! - **Connection**: blocking send/receive primitives with delimiter scanning
//! - **Interactive**: terminal pass-through multiplexed on one cooperative thread
//! - **Echo**: optional mirroring of raw traffic for protocol troubleshooting
//!
//! # Usage
//!
//! ```no_run
//! use netpuppet_net::{p64, remote, Endian};
//!
//! let mut io = remote("127.0.0.1", 31337)?;
//! io.sendlineafter("name: ", "A".repeat(40))?;
//! io.sendafter("addr: ", p64(0x401136, Endian::Little))?;
//! let banner = io.recvline(true)?;
//! println!("{}", String::from_utf8_lossy(&banner));
//! io.interactive()?;
//! # Ok::<(), netpuppet_net::Error>(())
//! ```

pub mod connection;
pub mod echo;
pub mod error;
pub mod interactive;
pub mod logging;

pub use connection::{remote, Connection, DEFAULT_RECV_SIZE};
pub use echo::{Direction, EchoSink};
pub use error::{Error, Result};
pub use interactive::InteractiveExit;

pub use netpuppet_core::{
    flat, p16, p32, p64, p8, unpack16, unpack32, unpack64, unpack8, Endian, PackError,
    RemoteOptions,
};

/// Alias for [`remote`]
pub fn connect(host: impl Into<String>, port: u16) -> Result<Connection> {
    remote(host, port)
}
