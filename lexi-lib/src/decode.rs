use std::path::Path;

use hifitime::Epoch;
use rayon::prelude::*;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::calibration::{Calibrator, Coefficients, HkChannel, Revision};
use crate::framing::{ScanSummary, Scanner, Variant};
use crate::packet::{unpack, Record, VOLTS_PER_COUNT};
use crate::prelude::*;
use crate::series::{Accumulator, DecodedSeries};

/// Options for decoding a single capture.
///
/// # Example
/// ```
/// use lexi::{DecodeOpts, framing::Variant, calibration::Revision};
///
/// let opts = DecodeOpts::builder()
///     .variant(Variant::Wrapped)
///     .revision(Revision::Two)
///     .build();
/// assert_eq!(opts.max_recovered_timer_jump, None);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct DecodeOpts {
    /// Wire layout of the capture.
    pub variant: Variant,
    /// Hardware revision of the unit that produced the capture.
    #[builder(default)]
    pub revision: Revision,
    #[builder(default = VOLTS_PER_COUNT)]
    pub volts_per_count: f64,
    /// Current monitor calibration.
    #[builder(default)]
    pub coefficients: Coefficients,
    /// Time of the first packet in the capture; typically the capture file's creation time.
    #[builder(default = Epoch::from_unix_seconds(0.0))]
    pub start: Epoch,
    /// When set, recovered packets whose timer jumps by more than this many milliseconds
    /// from the previous packet are discarded.
    #[builder(default, setter(strip_option))]
    pub max_recovered_timer_jump: Option<u32>,
}

/// Counts collected while decoding a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Summary {
    pub scan: ScanSummary,
    pub science: usize,
    pub housekeeping: usize,
    pub first_timer: Option<u32>,
    pub last_timer: Option<u32>,
    /// Number of housekeeping samples per channel id.
    pub channel_counts: [usize; HkChannel::COUNT],
}

impl Summary {
    pub fn add(&mut self, record: &Record) {
        match record {
            Record::Science(_) => self.science += 1,
            Record::Housekeeping(hk) => {
                self.housekeeping += 1;
                if let Some(count) = self.channel_counts.get_mut(usize::from(hk.channel_id)) {
                    *count += 1;
                }
            }
        }
        let timer = record.payload_timer();
        self.first_timer.get_or_insert(timer);
        self.last_timer = Some(timer);
    }
}

/// Decoded capture contents.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Decoded {
    pub series: DecodedSeries,
    pub summary: Summary,
}

/// Decode all packets in `capture`.
///
/// Truncated trailing bytes and unrecoverable packets are skipped and only reflected in
/// the returned [Summary]. A capture containing no packets produces an empty series.
///
/// # Errors
/// [Error::UnknownChannel] if a housekeeping packet references a channel that cannot be
/// calibrated.
pub fn decode(capture: &[u8], opts: &DecodeOpts) -> Result<Decoded> {
    let mut scanner = Scanner::new(capture, opts.variant);
    if let Some(max) = opts.max_recovered_timer_jump {
        scanner = scanner.with_max_timer_jump(max);
    }
    let calibrator = Calibrator::new(opts.revision, opts.volts_per_count, opts.coefficients);
    let mut acc = Accumulator::new(calibrator, opts.start);
    let mut summary = Summary::default();

    for window in scanner.by_ref() {
        let record = unpack(&window, opts.volts_per_count);
        summary.add(&record);
        acc.push(record)?;
    }
    summary.scan = scanner.summary().clone();

    if summary.scan.lost > 0 {
        warn!(
            lost = summary.scan.lost,
            windows = summary.scan.windows,
            "packets lost to misalignment"
        );
    }
    debug!(
        science = summary.science,
        housekeeping = summary.housekeeping,
        recovered = summary.scan.recovered(),
        tail_bytes = summary.scan.tail_bytes,
        "decoded capture"
    );

    Ok(Decoded {
        series: acc.finish(),
        summary,
    })
}

/// Read and decode the capture file at `path`.
///
/// # Errors
/// [Error::Io] if the file cannot be read, otherwise see [decode].
pub fn decode_file<P: AsRef<Path>>(path: P, opts: &DecodeOpts) -> Result<Decoded> {
    let path = path.as_ref();
    let capture = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = capture.len(), variant = ?opts.variant, "decoding file");
    decode(&capture, opts)
}

/// Decode multiple capture files in parallel.
///
/// Results are returned in the same order as `jobs`. A failure decoding one file does not
/// affect the others.
pub fn decode_files<P>(jobs: &[(P, DecodeOpts)]) -> Vec<Result<Decoded>>
where
    P: AsRef<Path> + Sync,
{
    jobs.par_iter()
        .map(|(path, opts)| decode_file(path, opts))
        .collect()
}
