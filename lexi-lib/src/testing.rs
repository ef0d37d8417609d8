//! Packet builders for unit tests.
use crate::framing::{INNER_MARKER, OUTER_MARKER};

/// Unwrapped instrument packet bytes.
pub(crate) fn payload(flags: u32, words: [u16; 4]) -> Vec<u8> {
    let mut buf = INNER_MARKER.to_vec();
    buf.extend_from_slice(&flags.to_be_bytes());
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf
}

/// Wrapped packet bytes with `capture_time` in the capture header.
pub(crate) fn wrapped(capture_time: f64, flags: u32, words: [u16; 4]) -> Vec<u8> {
    let mut buf = OUTER_MARKER.to_vec();
    buf.extend_from_slice(&capture_time.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]);
    buf.extend_from_slice(&payload(flags, words));
    buf
}
