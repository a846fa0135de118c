//! Fixed-width integer packing
//!
//! `p8`..`p64` encode an unsigned integer into a fixed-size byte array,
//! `unpack8`..`unpack64` decode one back. Little-endian is the default byte
//! order, matching x86/x86-64 targets.
//!
//! A single byte has no byte order, so `p8`/`unpack8` ignore `Endian`.

use serde::{Deserialize, Serialize};

/// Byte order for packing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Unpacking errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

macro_rules! packers {
    ($($pack:ident, $unpack:ident, $ty:ty;)*) => {
        $(
            #[doc = concat!("Pack a `", stringify!($ty), "` in the given byte order")]
            pub fn $pack(x: $ty, endian: Endian) -> [u8; std::mem::size_of::<$ty>()] {
                match endian {
                    Endian::Little => x.to_le_bytes(),
                    Endian::Big => x.to_be_bytes(),
                }
            }

            #[doc = concat!("Unpack a `", stringify!($ty), "`; `bytes` must be exactly its width")]
            pub fn $unpack(bytes: &[u8], endian: Endian) -> Result<$ty, PackError> {
                let raw: [u8; std::mem::size_of::<$ty>()] =
                    bytes.try_into().map_err(|_| PackError::Length {
                        expected: std::mem::size_of::<$ty>(),
                        actual: bytes.len(),
                    })?;
                Ok(match endian {
                    Endian::Little => <$ty>::from_le_bytes(raw),
                    Endian::Big => <$ty>::from_be_bytes(raw),
                })
            }
        )*
    };
}

packers! {
    p8, unpack8, u8;
    p16, unpack16, u16;
    p32, unpack32, u32;
    p64, unpack64, u64;
}

/// Concatenate payload pieces into one buffer
pub fn flat<T: AsRef<[u8]>>(parts: &[T]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.as_ref().len()).sum();
    let mut out = Vec::with_capacity(len);
    for part in parts {
        out.extend_from_slice(part.as_ref());
    }
    out
}
