//! Time ordered tables of decoded records.
//!
//! Housekeeping channels are multiplexed, each packet carrying a sample for a single channel.
//! The [Accumulator] forward-fills every channel with its most recent calibrated value so each
//! housekeeping row provides a value for all channels sampled at or before it.
use hifitime::{Duration, Epoch};

#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

use crate::calibration::{Calibrator, HkChannel};
use crate::packet::{HousekeepingRecord, Record, ScienceRecord};
use crate::prelude::*;

#[cfg(feature = "serde")]
fn serialize_epoch<S>(epoch: &Epoch, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(epoch)
}

/// A single science event with its derived time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScienceRow {
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_epoch"))]
    pub time: Epoch,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub record: ScienceRecord,
}

/// A housekeeping sample with the forward-filled value of every channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HousekeepingRow {
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_epoch"))]
    pub time: Epoch,
    pub capture_time: Option<f64>,
    pub payload_timer: u32,
    /// The channel sampled by the packet producing this row.
    pub channel_id: u8,
    /// Calibrated value of each channel indexed by channel id; `None` until the channel's
    /// first sample.
    pub channels: [Option<f64>; HkChannel::COUNT],
    pub delta_event_count: u16,
    pub delta_drop_count: u16,
    pub delta_lost_count: u16,
}

impl HousekeepingRow {
    #[must_use]
    pub fn get(&self, channel: HkChannel) -> Option<f64> {
        self.channels[usize::from(channel.id())]
    }
}

/// Science and housekeeping tables decoded from a single capture.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DecodedSeries {
    pub science: Vec<ScienceRow>,
    pub housekeeping: Vec<HousekeepingRow>,
}

impl DecodedSeries {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.science.is_empty() && self.housekeeping.is_empty()
    }

    /// Total number of rows in both tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.science.len() + self.housekeeping.len()
    }

    /// Rows whose time falls within `from` and `to`, inclusive.
    #[must_use]
    pub fn between(&self, from: Epoch, to: Epoch) -> DecodedSeries {
        let within = |t: &Epoch| *t >= from && *t <= to;
        DecodedSeries {
            science: self
                .science
                .iter()
                .filter(|r| within(&r.time))
                .cloned()
                .collect(),
            housekeeping: self
                .housekeeping
                .iter()
                .filter(|r| within(&r.time))
                .cloned()
                .collect(),
        }
    }

    /// The forward-filled values of `channel`, one per housekeeping row.
    pub fn column(&self, channel: HkChannel) -> impl Iterator<Item = Option<f64>> + '_ {
        self.housekeeping.iter().map(move |r| r.get(channel))
    }

    /// Time of the first and last row across both tables.
    #[must_use]
    pub fn time_span(&self) -> Option<(Epoch, Epoch)> {
        let times = self
            .science
            .iter()
            .map(|r| r.time)
            .chain(self.housekeeping.iter().map(|r| r.time));
        times.fold(None, |span, t| match span {
            None => Some((t, t)),
            Some((lo, hi)) => Some((if t < lo { t } else { lo }, if t > hi { t } else { hi })),
        })
    }
}

/// Builds a [DecodedSeries] from records in capture order.
pub struct Accumulator {
    calibrator: Calibrator,
    start: Epoch,
    last: [Option<f64>; HkChannel::COUNT],
    /// Timer of the first record of either kind; both tables share this time base.
    first_timer: Option<u32>,
    series: DecodedSeries,
}

/// Time of a row given the timer of the first record in the capture.
///
/// The difference is signed so a timer wrap moves backwards rather than failing.
fn row_time(start: Epoch, first: u32, timer: u32) -> Epoch {
    let elapsed_ms = i64::from(timer) - i64::from(first);
    start + Duration::from_milliseconds(elapsed_ms as f64)
}

impl Accumulator {
    /// Create an accumulator whose row times are relative to `start`.
    #[must_use]
    pub fn new(calibrator: Calibrator, start: Epoch) -> Self {
        Accumulator {
            calibrator,
            start,
            last: [None; HkChannel::COUNT],
            first_timer: None,
            series: DecodedSeries::default(),
        }
    }

    /// Add the next record.
    ///
    /// # Errors
    /// [Error::UnknownChannel] if a housekeeping record's channel cannot be calibrated.
    pub fn push(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Science(rec) => self.push_science(rec),
            Record::Housekeeping(rec) => self.push_housekeeping(rec)?,
        }
        Ok(())
    }

    fn time_of(&mut self, timer: u32) -> Epoch {
        let first = *self.first_timer.get_or_insert(timer);
        row_time(self.start, first, timer)
    }

    fn push_science(&mut self, record: ScienceRecord) {
        let time = self.time_of(record.payload_timer);
        self.series.science.push(ScienceRow { time, record });
    }

    fn push_housekeeping(&mut self, record: HousekeepingRecord) -> Result<()> {
        let sample = self
            .calibrator
            .calibrate(record.channel_id, record.raw_code)?;
        self.last[usize::from(record.channel_id)] = Some(sample.physical_value);

        let time = self.time_of(record.payload_timer);
        self.series.housekeeping.push(HousekeepingRow {
            time,
            capture_time: record.capture_time,
            payload_timer: record.payload_timer,
            channel_id: record.channel_id,
            channels: self.last,
            delta_event_count: record.delta_event_count,
            delta_drop_count: record.delta_drop_count,
            delta_lost_count: record.delta_lost_count,
        });
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> DecodedSeries {
        self.series
    }
}

/// Accumulate `records` into a [DecodedSeries].
///
/// # Errors
/// [Error::UnknownChannel] if a housekeeping record's channel cannot be calibrated.
pub fn accumulate<I>(records: I, calibrator: Calibrator, start: Epoch) -> Result<DecodedSeries>
where
    I: IntoIterator<Item = Record>,
{
    records
        .into_iter()
        .try_fold(Accumulator::new(calibrator, start), |mut acc, rec| {
            acc.push(rec)?;
            Ok::<_, Error>(acc)
        })
        .map(Accumulator::finish)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2024, 3, 1)
    }

    fn hk(timer: u32, channel_id: u8, raw_code: u16) -> Record {
        HousekeepingRecord {
            capture_time: Some(1.5),
            payload_timer: timer,
            channel_id,
            raw_code,
            delta_event_count: u16::from(channel_id),
            delta_drop_count: 0,
            delta_lost_count: 0,
        }
        .into()
    }

    fn sci(timer: u32) -> Record {
        ScienceRecord {
            capture_time: None,
            payload_timer: timer,
            is_commanded: false,
            channel1: 1.0,
            channel2: 2.0,
            channel3: 3.0,
            channel4: 4.0,
        }
        .into()
    }

    #[test]
    fn empty() {
        let series = accumulate(Vec::new(), Calibrator::default(), start()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.time_span(), None);
    }

    #[test]
    fn forward_fill() {
        let records = vec![hk(10, 3, 0x100), hk(20, 5, 0x200), hk(30, 3, 0x300), hk(40, 9, 0)];
        let calibrator = Calibrator::default();
        let series = accumulate(records, calibrator.clone(), start()).unwrap();
        let rows = &series.housekeeping;
        assert_eq!(rows.len(), 4);

        let value = |id, raw| Some(calibrator.calibrate(id, raw).unwrap().physical_value);

        assert_eq!(rows[0].channels[3], value(3, 0x100));
        assert_eq!(rows[0].channels[5], None);
        assert_eq!(rows[1].channels[3], value(3, 0x100));
        assert_eq!(rows[1].channels[5], value(5, 0x200));
        assert_eq!(rows[2].channels[3], value(3, 0x300));
        assert_eq!(rows[3].channels[5], value(5, 0x200));
        assert_eq!(rows[3].channels[9], value(9, 0));

        // never sampled stays unset, never zero
        for row in rows {
            assert_eq!(row.get(HkChannel::PinPullerTemp), None);
        }
        // counters are per row
        let deltas: Vec<u16> = rows.iter().map(|r| r.delta_event_count).collect();
        assert_eq!(deltas, vec![3, 5, 3, 9]);
        assert_eq!(rows[1].capture_time, Some(1.5));
    }

    #[test]
    fn column_follows_rows() {
        let records = vec![hk(0, 1, 0), hk(1, 2, 0), hk(2, 1, 0x10)];
        let series = accumulate(records, Calibrator::default(), start()).unwrap();
        let column: Vec<bool> = series.column(HkChannel::BaseTemp).map(|v| v.is_some()).collect();
        assert_eq!(column, vec![false, true, true]);
    }

    #[test]
    fn row_times_are_relative_to_first_timer() {
        let records = vec![sci(1000), hk(500, 0, 0), sci(1250), hk(400, 0, 0)];
        let series = accumulate(records, Calibrator::default(), start()).unwrap();

        assert_eq!(series.science[0].time, start());
        assert_eq!(
            series.science[1].time,
            start() + Duration::from_milliseconds(250.0)
        );
        // timer going backwards is not an error
        assert_eq!(
            series.housekeeping[0].time,
            start() - Duration::from_milliseconds(500.0)
        );
        assert_eq!(
            series.housekeeping[1].time,
            start() - Duration::from_milliseconds(600.0)
        );
        assert_eq!(series.science[1].record.channel4, 4.0);
    }

    #[test]
    fn tables_share_time_base() {
        let records = vec![sci(1000), hk(5000, 2, 0x100)];
        let series = accumulate(records, Calibrator::default(), start()).unwrap();

        assert_eq!(series.science[0].time, start());
        assert_eq!(
            series.housekeeping[0].time - series.science[0].time,
            Duration::from_seconds(4.0)
        );
        assert_eq!(
            series.time_span(),
            Some((start(), start() + Duration::from_seconds(4.0)))
        );

        // the first record sets the zero point whatever its kind
        let records = vec![hk(5000, 2, 0x100), sci(1000)];
        let series = accumulate(records, Calibrator::default(), start()).unwrap();
        assert_eq!(series.housekeeping[0].time, start());
        assert_eq!(
            series.science[0].time,
            start() - Duration::from_seconds(4.0)
        );
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let records = vec![hk(0, 1, 0), hk(1, 16, 0)];
        let err = accumulate(records, Calibrator::default(), start()).unwrap_err();
        assert!(matches!(err, Error::UnknownChannel { channel_id: 16 }));
    }

    #[test]
    fn between_is_inclusive() {
        let records = vec![sci(0), sci(1000), sci(2000), hk(0, 0, 0), hk(3000, 0, 0)];
        let series = accumulate(records, Calibrator::default(), start()).unwrap();

        let from = start() + Duration::from_milliseconds(1000.0);
        let to = start() + Duration::from_milliseconds(2000.0);
        let sliced = series.between(from, to);

        assert_eq!(sliced.science.len(), 2);
        assert!(sliced.housekeeping.is_empty());
        assert_eq!(sliced.len(), 2);
        assert_eq!(
            series.time_span(),
            Some((start(), start() + Duration::from_milliseconds(3000.0)))
        );
    }
}
