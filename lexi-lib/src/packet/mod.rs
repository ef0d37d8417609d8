//! Instrument packet field unpacking.
//!
//! Science and housekeeping packets share a single 16 byte layout, all fields big-endian:
//!
//! | bytes | field |
//! |---|---|
//! | 0..4 | inner sync marker |
//! | 4..8 | bit 31 housekeeping flag, bit 30 commanded flag, bits 0..30 payload timer |
//! | 8..16 | four 16-bit words |
//!
//! For science packets the four words are ADC counts. For housekeeping packets the first
//! word packs the channel id and sample code, the others are event counters.
//!
//! Wrapped windows additionally provide the capture time as a 64-bit float at bytes 2..10
//! of the capture header.
use derive_more::From;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::framing::PacketWindow;

/// Volts per ADC count.
pub const VOLTS_PER_COUNT: f64 = 4.5126 / 65536.0;
/// Payload timer bits of the flags word.
pub const TIMER_MASK: u32 = 0x3fff_ffff;
/// Value at which the payload timer wraps.
pub const TIMER_MODULUS: u32 = TIMER_MASK + 1;
/// Set for housekeeping packets.
pub const HOUSEKEEPING_FLAG: u32 = 0x8000_0000;
/// Set for science events that were commanded.
pub const COMMANDED_FLAG: u32 = 0x4000_0000;

const CHANNEL_ID_SHIFT: u16 = 12;
const CODE_MASK: u16 = 0x0fff;
const CODE_SHIFT: u16 = 4;
/// Channels whose code is a count or flag rather than a 12-bit ADC sample and is therefore
/// not shifted up to 16 bits.
const UNSHIFTED_CHANNELS: [u8; 2] = [10, 11];

/// A single science event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScienceRecord {
    /// Seconds since the UNIX epoch the packet was captured; wrapped captures only.
    pub capture_time: Option<f64>,
    /// 30-bit instrument timer.
    pub payload_timer: u32,
    pub is_commanded: bool,
    pub channel1: f64,
    pub channel2: f64,
    pub channel3: f64,
    pub channel4: f64,
}

/// A single multiplexed housekeeping sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HousekeepingRecord {
    /// Seconds since the UNIX epoch the packet was captured; wrapped captures only.
    pub capture_time: Option<f64>,
    /// 30-bit instrument timer.
    pub payload_timer: u32,
    /// Housekeeping channel this sample belongs to, 0 through 15.
    pub channel_id: u8,
    pub raw_code: u16,
    pub delta_event_count: u16,
    pub delta_drop_count: u16,
    pub delta_lost_count: u16,
}

/// Either kind of decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, From)]
pub enum Record {
    Science(ScienceRecord),
    Housekeeping(HousekeepingRecord),
}

impl Record {
    #[must_use]
    pub fn payload_timer(&self) -> u32 {
        match self {
            Record::Science(r) => r.payload_timer,
            Record::Housekeeping(r) => r.payload_timer,
        }
    }

    #[must_use]
    pub fn capture_time(&self) -> Option<f64> {
        match self {
            Record::Science(r) => r.capture_time,
            Record::Housekeeping(r) => r.capture_time,
        }
    }
}

fn capture_time(window: &PacketWindow) -> Option<f64> {
    let header = window.header();
    if header.len() < 10 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&header[2..10]);
    Some(f64::from_be_bytes(buf))
}

fn words(window: &PacketWindow) -> [u16; 4] {
    let p = window.payload();
    [
        u16::from_be_bytes([p[8], p[9]]),
        u16::from_be_bytes([p[10], p[11]]),
        u16::from_be_bytes([p[12], p[13]]),
        u16::from_be_bytes([p[14], p[15]]),
    ]
}

/// Unpack a science record using the nominal [VOLTS_PER_COUNT].
///
/// This does not check the housekeeping flag; any window can be interpreted as science.
#[must_use]
pub fn unpack_science(window: &PacketWindow) -> ScienceRecord {
    unpack_science_with(window, VOLTS_PER_COUNT)
}

/// Unpack a science record scaling ADC counts by `volts_per_count`.
#[must_use]
pub fn unpack_science_with(window: &PacketWindow, volts_per_count: f64) -> ScienceRecord {
    let flags = window.flags_word();
    let [c1, c2, c3, c4] = words(window);
    ScienceRecord {
        capture_time: capture_time(window),
        payload_timer: flags & TIMER_MASK,
        is_commanded: flags & COMMANDED_FLAG != 0,
        channel1: f64::from(c1) * volts_per_count,
        channel2: f64::from(c2) * volts_per_count,
        channel3: f64::from(c3) * volts_per_count,
        channel4: f64::from(c4) * volts_per_count,
    }
}

/// Unpack a housekeeping record, or `None` if the window does not have the housekeeping
/// flag set.
#[must_use]
pub fn unpack_housekeeping(window: &PacketWindow) -> Option<HousekeepingRecord> {
    let flags = window.flags_word();
    if flags & HOUSEKEEPING_FLAG == 0 {
        return None;
    }
    let [sample, events, dropped, lost] = words(window);
    // 4 bit id, so always fits
    let channel_id = (sample >> CHANNEL_ID_SHIFT) as u8;
    let code = sample & CODE_MASK;
    let raw_code = if UNSHIFTED_CHANNELS.contains(&channel_id) {
        code
    } else {
        code << CODE_SHIFT
    };

    Some(HousekeepingRecord {
        capture_time: capture_time(window),
        payload_timer: flags & TIMER_MASK,
        channel_id,
        raw_code,
        delta_event_count: events,
        delta_drop_count: dropped,
        delta_lost_count: lost,
    })
}

/// Unpack `window` as a housekeeping record if it has the housekeeping flag set, otherwise
/// as a science record.
#[must_use]
pub fn unpack(window: &PacketWindow, volts_per_count: f64) -> Record {
    match unpack_housekeeping(window) {
        Some(hk) => hk.into(),
        None => unpack_science_with(window, volts_per_count).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::Variant;
    use crate::testing::{payload, wrapped};
    use test_case::test_case;

    #[test]
    fn science_from_unwrapped() {
        let dat = payload(0x4000_0064, [0, 1, 0x8000, 0xffff]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Unwrapped).unwrap();

        let rec = unpack_science(&window);

        assert_eq!(rec.capture_time, None);
        assert_eq!(rec.payload_timer, 100);
        assert!(rec.is_commanded);
        assert_eq!(rec.channel1, 0.0);
        assert_eq!(rec.channel2, VOLTS_PER_COUNT);
        assert_eq!(rec.channel3, 32768.0 * VOLTS_PER_COUNT);
        assert_eq!(rec.channel4, 65535.0 * VOLTS_PER_COUNT);
    }

    #[test]
    fn science_from_wrapped() {
        let dat = wrapped(1_650_000_000.5, 0x0000_00ff, [10, 20, 30, 40]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Wrapped).unwrap();

        let rec = unpack_science(&window);

        assert_eq!(rec.capture_time, Some(1_650_000_000.5));
        assert_eq!(rec.payload_timer, 255);
        assert!(!rec.is_commanded);
        assert_eq!(rec.channel4, 40.0 * VOLTS_PER_COUNT);
    }

    #[test]
    fn timer_excludes_flag_bits() {
        let dat = payload(0xffff_ffff, [0, 0, 0, 0]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Unwrapped).unwrap();

        assert_eq!(unpack_science(&window).payload_timer, TIMER_MASK);
        assert_eq!(unpack_housekeeping(&window).unwrap().payload_timer, TIMER_MASK);
    }

    #[test]
    fn housekeeping_requires_flag() {
        let dat = payload(0x4000_0001, [0x1234, 0, 0, 0]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Unwrapped).unwrap();

        assert!(unpack_housekeeping(&window).is_none());
        assert!(matches!(unpack(&window, VOLTS_PER_COUNT), Record::Science(_)));
    }

    #[test_case(0x0123, 0, 0x1230; "channel 0 shifted")]
    #[test_case(0x7fff, 7, 0xfff0; "channel 7 shifted")]
    #[test_case(0xa005, 10, 0x0005; "command count unshifted")]
    #[test_case(0xb001, 11, 0x0001; "pin puller armed unshifted")]
    #[test_case(0xf800, 15, 0x8000; "channel 15 shifted")]
    fn housekeeping_sample_word(word: u16, channel_id: u8, raw_code: u16) {
        let dat = wrapped(12.0, 0x8000_0010, [word, 3, 2, 1]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Wrapped).unwrap();

        let rec = unpack_housekeeping(&window).unwrap();

        assert_eq!(rec.channel_id, channel_id);
        assert_eq!(rec.raw_code, raw_code);
        assert_eq!(rec.payload_timer, 16);
        assert_eq!(rec.capture_time, Some(12.0));
        assert_eq!(rec.delta_event_count, 3);
        assert_eq!(rec.delta_drop_count, 2);
        assert_eq!(rec.delta_lost_count, 1);
    }

    #[test]
    fn record_accessors() {
        let dat = wrapped(5.0, 0x8000_0003, [0, 0, 0, 0]);
        let window = PacketWindow::borrowed(&dat, 0, Variant::Wrapped).unwrap();
        let rec = unpack(&window, VOLTS_PER_COUNT);

        assert_eq!(rec.payload_timer(), 3);
        assert_eq!(rec.capture_time(), Some(5.0));
    }
}
