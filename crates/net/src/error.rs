//! Connection error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Operation timed out")]
    Timeout,

    #[error("Connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to start interactive runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl Error {
    /// Classify a socket error, folding both timeout flavours into `Timeout`
    pub(crate) fn from_socket(e: io::Error) -> Self {
        if is_timeout(&e) {
            Error::Timeout
        } else {
            Error::Io(e)
        }
    }
}

/// Blocking sockets report an elapsed timeout as `WouldBlock` on Unix and
/// `TimedOut` on Windows
pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
