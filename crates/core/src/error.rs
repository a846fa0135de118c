//! Error types for netpuppet core

use thiserror::Error;

use crate::pack::PackError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Packing error: {0}")]
    Pack(#[from] PackError),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
