use std::io::{stdout, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use handlebars::handlebars_helper;
use lexi::calibration::{HkChannel, Revision};
use lexi::framing::Variant;
use lexi::{decode_files, Decoded, Summary};
use serde::Serialize;
use tracing::{info, warn};

use crate::{hints, DecodeArgs};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChannelInfo {
    id: u8,
    name: &'static str,
    unit: String,
    samples: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    variant: Variant,
    revision: Revision,
    first_row_time: Option<String>,
    last_row_time: Option<String>,
    duration: Option<String>,
    summary: Summary,
    channels: Vec<ChannelInfo>,
}

fn summarize(fpath: &Path, variant: Variant, revision: Revision, decoded: Decoded) -> Info {
    let span = decoded.series.time_span();
    let channels = HkChannel::ALL
        .iter()
        .map(|ch| ChannelInfo {
            id: ch.id(),
            name: ch.name(),
            unit: ch.unit().to_string(),
            samples: decoded.summary.channel_counts[usize::from(ch.id())],
        })
        .collect();

    Info {
        filename: fpath.to_string_lossy().to_string(),
        variant,
        revision,
        first_row_time: span.map(|(first, _)| first.to_string()),
        last_row_time: span.map(|(_, last)| last.to_string()),
        duration: span.map(|(first, last)| (last - first).to_string()),
        summary: decoded.summary,
        channels,
    }
}

pub fn info(inputs: &[PathBuf], format: &Format, args: &DecodeArgs) -> Result<()> {
    let jobs = inputs
        .iter()
        .map(|path| Ok((path.clone(), hints::decode_opts(path, args)?)))
        .collect::<Result<Vec<_>>>()?;

    info!("decoding {} file(s)", jobs.len());
    let mut infos = Vec::with_capacity(jobs.len());
    for ((path, opts), zult) in jobs.iter().zip(decode_files(&jobs)) {
        let decoded = zult.with_context(|| format!("decoding {path:?}"))?;
        if decoded.summary.scan.lost > 0 {
            warn!("{path:?}: {} packets lost", decoded.summary.scan.lost);
        }
        infos.push(summarize(path, opts.variant, opts.revision, decoded));
    }

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &infos).context("serializing to json")
        }
        Format::Text => {
            let mut out = stdout();
            for info in &infos {
                let data = render_text(info).context("serializing info")?;
                out.write_all(data.as_bytes()).context("writing to stdout")?;
            }
            Ok(())
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .map_err(|err| anyhow!("registering template: {err}"))?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================================
Variant:      {{ variant }}
Revision:     {{ revision }}
First:        {{ first_row_time }}
Last:         {{ last_row_time }}
Duration:     {{ duration }}
Science:      {{ summary.science }}
Housekeeping: {{ summary.housekeeping }}
Timer:        {{ summary.first_timer }} - {{ summary.last_timer }}
Recovered:    early={{ summary.scan.recovered_early }} split={{ summary.scan.recovered_split }} late={{ summary.scan.recovered_late }}
Lost:         {{ summary.scan.lost }}
Tail bytes:   {{ summary.scan.tail_bytes }}
-----------------------------------------------------------------------------------------------
ID            Channel    Unit  Samples
-----------------------------------------------------------------------------------------------
{{ #each channels }}{{ lpad 2 id }}  {{ lpad 17 name }}  {{ lpad 6 unit }}  {{ lpad 7 samples }}
{{/each }}
";
