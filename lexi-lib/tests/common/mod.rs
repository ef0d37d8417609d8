#![allow(dead_code)]

use lexi::framing::{Variant, INNER_MARKER, OUTER_MARKER};

/// A packet to encode into a synthetic capture.
#[derive(Debug, Clone, Copy)]
pub enum Sample {
    Science {
        timer: u32,
        commanded: bool,
        counts: [u16; 4],
    },
    Housekeeping {
        timer: u32,
        channel_id: u8,
        /// 12-bit sample code
        code: u16,
        deltas: [u16; 3],
    },
}

impl Sample {
    pub fn timer(&self) -> u32 {
        match self {
            Sample::Science { timer, .. } | Sample::Housekeeping { timer, .. } => *timer,
        }
    }

    fn flags_and_words(&self) -> (u32, [u16; 4]) {
        match *self {
            Sample::Science {
                timer,
                commanded,
                counts,
            } => {
                let flags = if commanded { 0x4000_0000 } else { 0 };
                (flags | timer, counts)
            }
            Sample::Housekeeping {
                timer,
                channel_id,
                code,
                deltas,
            } => {
                let word = (u16::from(channel_id) << 12) | (code & 0x0fff);
                (0x8000_0000 | timer, [word, deltas[0], deltas[1], deltas[2]])
            }
        }
    }
}

/// Encode a single packet, with a capture header containing `capture_time` for wrapped.
pub fn encode(sample: &Sample, variant: Variant, capture_time: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(variant.window_len());
    if variant == Variant::Wrapped {
        buf.extend_from_slice(&OUTER_MARKER);
        buf.extend_from_slice(&capture_time.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
    }
    let (flags, words) = sample.flags_and_words();
    buf.extend_from_slice(&INNER_MARKER);
    buf.extend_from_slice(&flags.to_be_bytes());
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf
}

/// Capture time used for the packet at `idx`.
pub fn capture_time(idx: usize) -> f64 {
    1_709_251_200.0 + idx as f64 * 0.125
}

/// Encode `samples` back-to-back.
pub fn capture(samples: &[Sample], variant: Variant) -> Vec<u8> {
    samples
        .iter()
        .enumerate()
        .flat_map(|(idx, s)| encode(s, variant, capture_time(idx)))
        .collect()
}

/// A repeating mix of science and housekeeping samples with increasing timers.
pub fn mixed(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|idx| {
            let timer = 1000 + idx as u32 * 10;
            if idx % 3 == 0 {
                Sample::Housekeeping {
                    timer,
                    channel_id: (idx % 16) as u8,
                    code: (idx * 37 % 4096) as u16,
                    deltas: [idx as u16, 1, 2],
                }
            } else {
                Sample::Science {
                    timer,
                    commanded: idx % 5 == 0,
                    counts: [idx as u16, 100, 200, 0xffff],
                }
            }
        })
        .collect()
}
