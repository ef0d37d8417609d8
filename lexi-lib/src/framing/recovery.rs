use tracing::trace;

#[cfg(feature = "serde")]
use serde::Serialize;

use super::{marker_at, PacketWindow, Variant, INNER_MARKER};

/// Number of bytes following the nominal [INNER_MARKER] location searched for a late marker.
pub const LOOKAHEAD: usize = 16;
/// Largest number of dropped or displaced bytes that will be repaired.
pub const MAX_DISPLACEMENT: usize = 3;
/// Largest number of inserted bytes that will be repaired, i.e., the marker must still be
/// fully contained in the [LOOKAHEAD] bytes.
pub const MAX_INSERTION: usize = LOOKAHEAD - INNER_MARKER.len();

/// Describes how the bytes around a misplaced [INNER_MARKER] are reassembled into a
/// wrapped packet window. `outer` below refers to the offset of the outer marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Shift {
    /// `n` bytes were dropped between the outer and inner markers so the inner marker
    /// is found at `outer + 12 - n`. The header is zero-padded back to 12 bytes.
    Early(usize),
    /// The first `n` bytes of the inner marker were displaced to immediately before the
    /// outer marker while the remaining bytes are in their nominal location.
    Split(usize),
    /// `n` bytes were inserted between the outer and inner markers so the inner marker is
    /// found at `outer + 12 + n`.
    Late(usize),
}

impl Shift {
    /// Number of bytes the packet moved relative to its nominal layout.
    #[must_use]
    pub fn magnitude(&self) -> usize {
        match *self {
            Shift::Early(n) | Shift::Split(n) | Shift::Late(n) => n,
        }
    }

    /// Offset of the first byte following a packet recovered with this shift whose outer
    /// marker is at `outer`.
    #[must_use]
    pub fn next_offset(&self, outer: usize) -> usize {
        let len = Variant::Wrapped.window_len();
        match *self {
            Shift::Early(n) | Shift::Split(n) => outer + len - n,
            Shift::Late(n) => outer + len + n,
        }
    }

    fn matches(&self, capture: &[u8], outer: usize) -> bool {
        let nominal = outer + Variant::HEADER_LEN;
        match *self {
            Shift::Early(n) => marker_at(capture, nominal - n, &INNER_MARKER),
            Shift::Split(n) => {
                let Some(start) = outer.checked_sub(n) else {
                    return false;
                };
                marker_at(capture, start, &INNER_MARKER[..n])
                    && marker_at(capture, nominal, &INNER_MARKER[n..])
            }
            Shift::Late(n) => marker_at(capture, nominal + n, &INNER_MARKER),
        }
    }
}

/// All supported shifts in the order they are attempted, smallest magnitude first.
///
/// For equal magnitudes dropped bytes are preferred over displaced bytes, which are
/// preferred over inserted bytes.
pub fn candidates() -> impl Iterator<Item = Shift> {
    (1..=MAX_INSERTION).flat_map(|n| {
        let displaced = (n <= MAX_DISPLACEMENT).then_some([Shift::Early(n), Shift::Split(n)]);
        displaced
            .into_iter()
            .flatten()
            .chain(std::iter::once(Shift::Late(n)))
    })
}

/// Find the first shift that locates the [INNER_MARKER] for the outer marker at `outer` and
/// for which there are enough bytes in `capture` to reassemble a window.
#[must_use]
pub fn find_shift(capture: &[u8], outer: usize) -> Option<Shift> {
    candidates()
        .find(|shift| shift.matches(capture, outer) && shift.next_offset(outer) <= capture.len())
}

/// Reassemble a wrapped window for the outer marker at `outer` using `shift`.
///
/// Returns `None` if the bytes required are not available. This does not verify the shift
/// matches the capture, see [find_shift].
#[must_use]
pub fn reconstruct(capture: &[u8], outer: usize, shift: Shift) -> Option<PacketWindow<'_>> {
    let header_len = Variant::HEADER_LEN;
    let window_len = Variant::Wrapped.window_len();
    let mut buf: Vec<u8> = Vec::with_capacity(window_len);

    match shift {
        Shift::Early(n) => {
            buf.extend_from_slice(capture.get(outer..outer + header_len - n)?);
            buf.resize(header_len, 0);
            buf.extend_from_slice(capture.get(outer + header_len - n..outer + window_len - n)?);
        }
        Shift::Split(n) => {
            let start = outer.checked_sub(n)?;
            buf.extend_from_slice(capture.get(outer..outer + header_len)?);
            buf.extend_from_slice(capture.get(start..outer)?);
            buf.extend_from_slice(capture.get(outer + header_len..outer + window_len - n)?);
        }
        Shift::Late(n) => {
            buf.extend_from_slice(capture.get(outer..outer + header_len)?);
            buf.extend_from_slice(capture.get(outer + header_len + n..outer + window_len + n)?);
        }
    }

    Some(PacketWindow::reassembled(outer, shift, buf))
}

/// Attempt to recover a wrapped packet whose outer marker at `outer` is not followed by the
/// inner marker at the nominal offset.
///
/// Returns `None` if no supported [Shift] applies, in which case the packet is lost.
///
/// # Panics
/// In debug builds, if the inner marker is actually at its nominal offset. That case must
/// be handled by the scanner and never gets here.
#[must_use]
pub fn recover(capture: &[u8], outer: usize) -> Option<PacketWindow<'_>> {
    debug_assert!(
        !marker_at(capture, outer + Variant::HEADER_LEN, &INNER_MARKER),
        "recovery requested for aligned packet at {outer}"
    );
    let shift = find_shift(capture, outer)?;
    trace!(outer, ?shift, "recovering misaligned packet");
    reconstruct(capture, outer, shift)
}
