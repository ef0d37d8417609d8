mod dump;
mod hints;
mod info;

use std::io::stderr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hifitime::Epoch;
use lexi::calibration::Revision;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options controlling how a capture is decoded. Anything not provided is determined from
/// the input file.
#[derive(Args, Debug, Clone, Default)]
pub struct DecodeArgs {
    /// Input packets are wrapped in the payload interface capture header. The default is
    /// wrapped if the file name contains "payload".
    #[arg(long, action, conflicts_with = "unwrapped")]
    wrapped: bool,

    /// Input packets are bare instrument packets.
    #[arg(long, action)]
    unwrapped: bool,

    /// Hardware revision of the instrument unit, 1 or 2. The default is taken from a
    /// unit_1/unit_2 file name component, otherwise 1.
    #[arg(short, long, value_parser = parse_revision)]
    revision: Option<Revision>,

    /// JSON file of current monitor calibration coefficients.
    #[arg(short, long, value_name = "path")]
    coefficients: Option<PathBuf>,

    /// Time of the first packet (RFC3339). The default is the file creation time, or
    /// modification time where creation time is not available.
    #[arg(short, long, value_parser = parse_timestamp, value_name = "timestamp")]
    start: Option<Epoch>,

    /// Discard recovered packets whose timer differs from the previous packet by more
    /// than this many milliseconds.
    #[arg(long, value_name = "ms")]
    max_timer_jump: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about LEXI capture files.
    Info {
        /// Input capture files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,

        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// Write decoded rows as JSON lines to stdout.
    Dump {
        /// Input capture file
        input: PathBuf,

        /// Only write rows of this kind
        #[arg(short, long, default_value = "all")]
        kind: dump::Kind,

        /// Drop any rows with a time before this time (RFC3339).
        #[arg(long, value_parser = parse_timestamp, value_name = "timestamp")]
        from: Option<Epoch>,

        /// Drop any rows with a time after this time (RFC3339).
        #[arg(long, value_parser = parse_timestamp, value_name = "timestamp")]
        to: Option<Epoch>,

        #[command(flatten)]
        decode: DecodeArgs,
    },
}

fn parse_timestamp(s: &str) -> Result<Epoch, String> {
    Epoch::from_str(s).map_err(|_| "Could not parse into an RFC3339 timestamp".to_string())
}

fn parse_revision(s: &str) -> Result<Revision, String> {
    let value = s
        .parse::<u8>()
        .map_err(|_| format!("invalid revision {s:?}"))?;
    Revision::try_from(value).map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("LEXI_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Info {
            inputs,
            format,
            decode,
        } => info::info(inputs, format, decode),
        Commands::Dump {
            input,
            kind,
            from,
            to,
            decode,
        } => dump::dump(input, kind, *from, *to, decode),
    }
}
