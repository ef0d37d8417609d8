use std::io::{stdout, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use hifitime::Epoch;
use lexi::calibration::HkChannel;
use lexi::decode_file;
use lexi::series::{DecodedSeries, HousekeepingRow};
use serde_json::{Map, Value};
use tracing::info;

use crate::{hints, DecodeArgs};

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    All,
    Science,
    Housekeeping,
}

impl clap::ValueEnum for Kind {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::All, Self::Science, Self::Housekeeping]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::All => Some(clap::builder::PossibleValue::new("all")),
            Self::Science => Some(clap::builder::PossibleValue::new("science")),
            Self::Housekeeping => Some(clap::builder::PossibleValue::new("housekeeping")),
        }
    }
}

/// Housekeeping row as a JSON object with a named column per channel.
fn housekeeping_value(row: &HousekeepingRow) -> Result<Value> {
    let mut value = serde_json::to_value(row).context("serializing housekeeping row")?;
    let Value::Object(ref mut obj) = value else {
        bail!("housekeeping row did not serialize to an object");
    };
    obj.remove("channels");
    let mut channels = Map::new();
    for ch in HkChannel::ALL {
        channels.insert(ch.name().to_string(), row.get(ch).into());
    }
    obj.insert("channels".to_string(), Value::Object(channels));
    Ok(value)
}

fn write_rows<W: Write>(mut w: W, series: &DecodedSeries, kind: &Kind) -> Result<usize> {
    let mut count = 0;
    if matches!(kind, Kind::All | Kind::Science) {
        for row in &series.science {
            let mut value = serde_json::to_value(row).context("serializing science row")?;
            if let Value::Object(ref mut obj) = value {
                obj.insert("kind".to_string(), "science".into());
            }
            serde_json::to_writer(&mut w, &value).context("writing row")?;
            w.write_all(b"\n").context("writing row")?;
            count += 1;
        }
    }
    if matches!(kind, Kind::All | Kind::Housekeeping) {
        for row in &series.housekeeping {
            let mut value = housekeeping_value(row)?;
            if let Value::Object(ref mut obj) = value {
                obj.insert("kind".to_string(), "housekeeping".into());
            }
            serde_json::to_writer(&mut w, &value).context("writing row")?;
            w.write_all(b"\n").context("writing row")?;
            count += 1;
        }
    }
    w.flush().context("flushing output")?;
    Ok(count)
}

pub fn dump(
    input: &Path,
    kind: &Kind,
    from: Option<Epoch>,
    to: Option<Epoch>,
    args: &DecodeArgs,
) -> Result<()> {
    let opts = hints::decode_opts(input, args)?;
    let decoded = decode_file(input, &opts).with_context(|| format!("decoding {input:?}"))?;

    let series = match (decoded.series.time_span(), from, to) {
        (Some((first, last)), from, to) if from.is_some() || to.is_some() => decoded
            .series
            .between(from.unwrap_or(first), to.unwrap_or(last)),
        _ => decoded.series,
    };

    let count = write_rows(BufWriter::new(stdout().lock()), &series, kind)?;
    info!("wrote {count} rows from {input:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexi::framing::Variant;
    use lexi::{decode, DecodeOpts};

    fn series() -> DecodedSeries {
        #[rustfmt::skip]
        let dat: &[u8] = &[
            // science, timer 1
            0xfe, 0x6b, 0x28, 0x40, 0x00, 0x00, 0x00, 0x01,
            0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04,
            // housekeeping channel 10, count 5, timer 2
            0xfe, 0x6b, 0x28, 0x40, 0x80, 0x00, 0x00, 0x02,
            0xa0, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let opts = DecodeOpts::builder().variant(Variant::Unwrapped).build();
        decode(dat, &opts).unwrap().series
    }

    #[test]
    fn writes_json_lines() {
        let mut buf = Vec::new();
        let count = write_rows(&mut buf, &series(), &Kind::All).unwrap();
        assert_eq!(count, 2);

        let lines: Vec<Value> = String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines[0]["kind"], "science");
        assert_eq!(lines[0]["payload_timer"], 1);
        assert_eq!(lines[1]["kind"], "housekeeping");
        assert_eq!(lines[1]["channels"]["Cmd_count"], 5.0);
        assert!(lines[1]["channels"]["PinPullerTemp"].is_null());
    }

    #[test]
    fn filters_kind() {
        let mut buf = Vec::new();
        let count = write_rows(&mut buf, &series(), &Kind::Housekeeping).unwrap();
        assert_eq!(count, 1);
    }
}
