#![doc = include_str!("../README.md")]

mod error;

pub mod calibration;
pub mod decode;
pub mod framing;
pub mod packet;
pub mod series;

pub use decode::{decode, decode_file, decode_files, DecodeOpts, Decoded, Summary};
pub use error::{Error, Result};

#[cfg(test)]
mod testing;

pub(crate) mod prelude {
    pub use crate::error::{Error, Result};
}
