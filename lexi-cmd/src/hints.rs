//! Decode options derived from capture files.
//!
//! Captures do not describe their own wire variant or hardware revision, so these are taken
//! from file naming conventions unless given explicitly.
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use hifitime::Epoch;
use lexi::calibration::{Coefficients, Revision};
use lexi::framing::Variant;
use lexi::DecodeOpts;
use regex::Regex;
use tracing::{debug, warn};

use crate::DecodeArgs;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Captures recorded through the payload interface are wrapped.
pub fn variant_hint(path: &Path) -> Variant {
    if file_name(path).contains("payload") {
        Variant::Wrapped
    } else {
        Variant::Unwrapped
    }
}

static UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"unit_?([12])(?:\D|$)").expect("regex to compile"));

/// Revision from a `unit_1`/`unit1` or `unit_2`/`unit2` file name component, if any.
pub fn revision_hint(path: &Path) -> Option<Revision> {
    let name = file_name(path);
    let cap = UNIT_RE.captures(&name)?;
    cap[1].parse::<u8>().ok().and_then(|v| Revision::try_from(v).ok())
}

fn to_epoch(time: SystemTime) -> Result<Epoch> {
    let since = time
        .duration_since(UNIX_EPOCH)
        .context("file time before 1970")?;
    Ok(Epoch::from_unix_seconds(since.as_secs_f64()))
}

/// File creation time, or modification time on filesystems without creation times.
pub fn start_time(path: &Path) -> Result<Epoch> {
    let md = std::fs::metadata(path).with_context(|| format!("reading metadata for {path:?}"))?;
    let time = match md.created() {
        Ok(time) => time,
        Err(err) => {
            debug!("no creation time for {path:?} ({err}); using modification time");
            md.modified()
                .with_context(|| format!("reading modification time for {path:?}"))?
        }
    };
    to_epoch(time)
}

pub fn load_coefficients(path: &Path) -> Result<Coefficients> {
    let file = File::open(path).with_context(|| format!("opening coefficients {path:?}"))?;
    serde_json::from_reader(file).with_context(|| format!("parsing coefficients {path:?}"))
}

/// Build decode options for `path`, preferring anything set explicitly in `args`.
pub fn decode_opts(path: &Path, args: &DecodeArgs) -> Result<DecodeOpts> {
    let variant = if args.wrapped {
        Variant::Wrapped
    } else if args.unwrapped {
        Variant::Unwrapped
    } else {
        variant_hint(path)
    };

    let revision = match args.revision.or_else(|| revision_hint(path)) {
        Some(revision) => revision,
        None => {
            warn!("could not determine hardware revision for {path:?}; assuming 1");
            Revision::One
        }
    };

    let coefficients = match &args.coefficients {
        Some(fpath) => load_coefficients(fpath)?,
        None => Coefficients::default(),
    };

    let start = match args.start {
        Some(start) => start,
        None => start_time(path)?,
    };

    debug!("{path:?}: variant={variant:?} revision={revision} start={start}");

    let opts = DecodeOpts::builder()
        .variant(variant)
        .revision(revision)
        .coefficients(coefficients)
        .start(start)
        .build();
    Ok(DecodeOpts {
        max_recovered_timer_jump: args.max_timer_jump,
        ..opts
    })
}
