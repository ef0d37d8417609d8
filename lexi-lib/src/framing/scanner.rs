use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::Serialize;

use super::{find_shift, marker_at, reconstruct, PacketWindow, Shift, Variant};
use super::{INNER_MARKER, OUTER_MARKER};
use crate::packet::{TIMER_MASK, TIMER_MODULUS};

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Searching for a marker starting at the contained offset.
    Scanning(usize),
    /// An outer marker was found at the contained offset without an inner marker at its
    /// nominal location.
    CandidateOuterHit(usize),
    /// A shift was found for the outer marker at `offset`.
    Recovering { offset: usize, shift: Shift },
    /// No more windows can be produced.
    Finished,
}

/// Result of advancing the scanner by a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<'a> {
    Continue(State),
    /// A window was located; scanning continues with the contained state.
    Emit(PacketWindow<'a>, State),
    /// The packet whose outer marker is at `offset` could not be recovered.
    Lost { offset: usize, next: State },
    /// Scanning is complete with `tail` trailing bytes not part of any window.
    Finished { tail: usize },
}

/// Compute the next scanner step for `capture` from `state`.
///
/// This has no side-effects, so any state, including one constructed by the caller, may be
/// used to resume scanning.
#[must_use]
pub fn transition(capture: &[u8], variant: Variant, state: State) -> Transition<'_> {
    match state {
        State::Scanning(mut idx) => {
            let window_len = variant.window_len();
            while idx + window_len <= capture.len() {
                match variant {
                    Variant::Wrapped if marker_at(capture, idx, &OUTER_MARKER) => {
                        if !marker_at(capture, idx + Variant::HEADER_LEN, &INNER_MARKER) {
                            return Transition::Continue(State::CandidateOuterHit(idx));
                        }
                        if let Some(window) = PacketWindow::borrowed(capture, idx, variant) {
                            return Transition::Emit(window, State::Scanning(idx + window_len));
                        }
                    }
                    Variant::Unwrapped if marker_at(capture, idx, &INNER_MARKER) => {
                        if let Some(window) = PacketWindow::borrowed(capture, idx, variant) {
                            return Transition::Emit(window, State::Scanning(idx + window_len));
                        }
                    }
                    _ => {}
                }
                idx += 1;
            }
            Transition::Finished {
                tail: capture.len().saturating_sub(idx),
            }
        }
        State::CandidateOuterHit(offset) => match find_shift(capture, offset) {
            Some(shift) => Transition::Continue(State::Recovering { offset, shift }),
            None => Transition::Lost {
                offset,
                next: State::Scanning(offset + 1),
            },
        },
        State::Recovering { offset, shift } => match reconstruct(capture, offset, shift) {
            Some(window) => Transition::Emit(window, State::Scanning(shift.next_offset(offset))),
            None => Transition::Lost {
                offset,
                next: State::Scanning(offset + 1),
            },
        },
        State::Finished => Transition::Finished { tail: 0 },
    }
}

/// Distance between two payload timers accounting for the 30-bit wrap.
#[must_use]
pub fn timer_distance(a: u32, b: u32) -> u32 {
    let d = a.wrapping_sub(b) & TIMER_MASK;
    d.min(TIMER_MODULUS - d)
}

/// Counts collected while scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScanSummary {
    /// Total windows produced, including recovered windows.
    pub windows: usize,
    pub recovered_early: usize,
    pub recovered_split: usize,
    pub recovered_late: usize,
    /// Outer markers for which no window could be produced.
    pub lost: usize,
    /// Trailing bytes too short to contain a window.
    pub tail_bytes: usize,
}

impl ScanSummary {
    #[must_use]
    pub fn recovered(&self) -> usize {
        self.recovered_early + self.recovered_split + self.recovered_late
    }
}

/// Iterates over the [PacketWindow]s in a capture.
///
/// Truncated trailing bytes and unrecoverable packets are never errors, they are only
/// reflected in the [ScanSummary].
///
/// # Example
/// ```
/// use lexi::framing::{Scanner, Variant};
///
/// let capture = vec![0u8; 64];
/// let mut scanner = Scanner::new(&capture, Variant::Unwrapped);
/// assert!(scanner.next().is_none());
/// assert_eq!(scanner.summary().tail_bytes, 15);
/// ```
pub struct Scanner<'a> {
    capture: &'a [u8],
    variant: Variant,
    state: State,
    max_timer_jump: Option<u32>,
    last_timer: Option<u32>,
    summary: ScanSummary,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(capture: &'a [u8], variant: Variant) -> Self {
        Scanner {
            capture,
            variant,
            state: State::Scanning(0),
            max_timer_jump: None,
            last_timer: None,
            summary: ScanSummary::default(),
        }
    }

    /// Start scanning at `offset` rather than the start of the capture.
    #[must_use]
    pub fn starting_at(mut self, offset: usize) -> Self {
        self.state = State::Scanning(offset);
        self
    }

    /// Reject recovered windows whose payload timer is more than `max` milliseconds from
    /// the previously produced window. Rejected windows are counted as lost.
    #[must_use]
    pub fn with_max_timer_jump(mut self, max: u32) -> Self {
        self.max_timer_jump = Some(max);
        self
    }

    #[must_use]
    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    fn plausible(&self, window: &PacketWindow) -> bool {
        let (Some(max), Some(last)) = (self.max_timer_jump, self.last_timer) else {
            return true;
        };
        timer_distance(window.flags_word() & TIMER_MASK, last) <= max
    }

    fn accept(&mut self, window: &PacketWindow) {
        match window.shift {
            Some(Shift::Early(_)) => self.summary.recovered_early += 1,
            Some(Shift::Split(_)) => self.summary.recovered_split += 1,
            Some(Shift::Late(_)) => self.summary.recovered_late += 1,
            None => {}
        }
        self.summary.windows += 1;
        self.last_timer = Some(window.flags_word() & TIMER_MASK);
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = PacketWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == State::Finished {
                return None;
            }
            match transition(self.capture, self.variant, self.state) {
                Transition::Continue(next) => self.state = next,
                Transition::Emit(window, next) => {
                    if window.is_recovered() && !self.plausible(&window) {
                        debug!(
                            offset = window.offset,
                            shift = ?window.shift,
                            "rejecting recovered window with implausible timer"
                        );
                        self.summary.lost += 1;
                        self.state = State::Scanning(window.offset + 1);
                        continue;
                    }
                    if window.is_recovered() {
                        debug!(offset = window.offset, shift = ?window.shift, "recovered window");
                    }
                    self.accept(&window);
                    self.state = next;
                    return Some(window);
                }
                Transition::Lost { offset, next } => {
                    trace!(offset, "lost packet");
                    self.summary.lost += 1;
                    self.state = next;
                }
                Transition::Finished { tail } => {
                    self.summary.tail_bytes = tail;
                    self.state = State::Finished;
                    return None;
                }
            }
        }
    }
}
