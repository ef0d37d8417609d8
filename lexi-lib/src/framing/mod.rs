//! LEXI packet framing.
//!
//! A capture is a flat byte buffer containing back-to-back fixed size packets. Each
//! instrument packet starts with [INNER_MARKER]. Captures recorded through the payload
//! interface ([Variant::Wrapped]) additionally wrap every packet in a 12 byte header that
//! starts with [OUTER_MARKER] and carries the time the packet was captured.
//!
//! The [Scanner] locates packet windows, handing off to [recover] when a wrapper is found
//! without its payload marker in the expected location.
mod recovery;
mod scanner;

use std::borrow::Cow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use recovery::*;
pub use scanner::*;

/// Marker starting the payload interface wrapper.
pub const OUTER_MARKER: [u8; 2] = [0x54, 0x53];
/// Marker starting every instrument packet.
pub const INNER_MARKER: [u8; 4] = [0xfe, 0x6b, 0x28, 0x40];

/// Wire layout of a capture.
///
/// The variant is not self-describing in the byte stream and must be provided by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Variant {
    /// Packets wrapped in a 12 byte capture header; 28 bytes per packet.
    Wrapped,
    /// Bare instrument packets; 16 bytes per packet.
    Unwrapped,
}

impl Variant {
    /// Offset of the [INNER_MARKER] relative to the [OUTER_MARKER] for wrapped packets.
    pub const HEADER_LEN: usize = 12;
    /// Length of the instrument packet, starting with the [INNER_MARKER].
    pub const PAYLOAD_LEN: usize = 16;

    /// Total number of bytes in a single packet window.
    #[must_use]
    pub fn window_len(self) -> usize {
        self.header_len() + Self::PAYLOAD_LEN
    }

    /// Number of bytes before the [INNER_MARKER].
    #[must_use]
    pub fn header_len(self) -> usize {
        match self {
            Variant::Wrapped => Self::HEADER_LEN,
            Variant::Unwrapped => 0,
        }
    }
}

/// A fixed size slice of a capture believed to contain exactly one packet.
///
/// Windows that were located directly borrow from the capture. Windows reassembled by
/// [recover] own their bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketWindow<'a> {
    /// Offset in the capture of the first byte of the window, i.e., the [OUTER_MARKER] for
    /// wrapped and the [INNER_MARKER] for unwrapped windows.
    pub offset: usize,
    pub variant: Variant,
    /// The shift used to reassemble this window, if it was recovered.
    pub shift: Option<Shift>,
    data: Cow<'a, [u8]>,
}

impl<'a> PacketWindow<'a> {
    /// Create a window borrowing from `capture` at `offset`, or `None` if there are not enough
    /// bytes available.
    #[must_use]
    pub fn borrowed(capture: &'a [u8], offset: usize, variant: Variant) -> Option<Self> {
        let data = capture.get(offset..offset + variant.window_len())?;
        Some(PacketWindow {
            offset,
            variant,
            shift: None,
            data: Cow::Borrowed(data),
        })
    }

    pub(crate) fn reassembled(offset: usize, shift: Shift, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), Variant::Wrapped.window_len());
        PacketWindow {
            offset,
            variant: Variant::Wrapped,
            shift: Some(shift),
            data: Cow::Owned(data),
        }
    }

    /// All window bytes, including any capture header.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The capture header bytes; empty for unwrapped windows.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.data[..self.variant.header_len()]
    }

    /// The instrument packet bytes, starting with the [INNER_MARKER].
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[self.variant.header_len()..]
    }

    #[must_use]
    pub fn is_recovered(&self) -> bool {
        self.shift.is_some()
    }

    /// The packed flags and timer word, the second 32-bit word of the payload.
    #[must_use]
    pub fn flags_word(&self) -> u32 {
        let p = self.payload();
        u32::from_be_bytes([p[4], p[5], p[6], p[7]])
    }
}

/// True when `pattern` is present in `capture` starting at `offset`.
pub(crate) fn marker_at(capture: &[u8], offset: usize, pattern: &[u8]) -> bool {
    capture
        .get(offset..offset + pattern.len())
        .is_some_and(|b| b == pattern)
}
