//! Netpuppet Core Library
//!
//! Stateless helpers shared by the connection layer: fixed-width integer
//! packing and connection options.

pub mod error;
pub mod options;
pub mod pack;

pub use error::{Error, Result};
pub use options::RemoteOptions;
pub use pack::{
    flat, p16, p32, p64, p8, unpack16, unpack32, unpack64, unpack8, Endian, PackError,
};
