//! Signal Browser command line
//!
//! Lists the groups and channels of TDM, RTI recorder and PLC logs and dumps
//! single channels as CSV or JSON.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

use signal_browser::normalize::{present, PlotTrace, Presentation};
use signal_browser::parsers::open_reader;
use signal_browser::settings::{ReaderSettings, TdmTimeEncoding};
use signal_browser::units::UnitConversion;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to the per-user config file)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Override how TDM time channels are decoded
    #[arg(long, global = true, value_enum)]
    tdm_time: Option<TdmTime>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TdmTime {
    ZeroEpoch,
    Unix,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List groups (TDM channel groups, recorder tables, PLC recordings)
    Groups {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the channels of one group
    Channels {
        #[arg(short, long)]
        group: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print one channel as a time series
    Dump {
        #[arg(short, long)]
        group: String,
        /// Channel name, or its index inside a TDM group
        #[arg(short, long)]
        channel: String,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Source unit of the channel, for conversion
        #[arg(long, requires = "to_unit")]
        from_unit: Option<String>,
        /// Display unit
        #[arg(long, requires = "from_unit")]
        to_unit: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn load_settings(args: &Args) -> ReaderSettings {
    let mut settings = match &args.settings {
        Some(path) => ReaderSettings::load_from(path),
        None => ReaderSettings::load(),
    };
    match args.tdm_time {
        Some(TdmTime::ZeroEpoch) => settings.tdm_time_encoding = TdmTimeEncoding::ZeroEpoch,
        Some(TdmTime::Unix) => settings.tdm_time_encoding = TdmTimeEncoding::UnixSeconds,
        None => {}
    }
    settings
}

fn write_csv(out: &mut impl Write, trace: &PlotTrace) -> std::io::Result<()> {
    let header = match &trace.unit {
        Some(unit) => format!("{} [{}]", trace.name, unit),
        None => trace.name.clone(),
    };
    writeln!(out, "time,{}", header)?;
    for (i, t) in trace.times.iter().enumerate() {
        let time = t.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        match trace.presentation {
            Presentation::Text => writeln!(out, "{},{}", time, trace.labels[i])?,
            _ => writeln!(out, "{},{}", time, trace.y[i])?,
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &args.command {
        Command::Groups { files } => {
            let reader = open_reader(files, &settings).context("failed to open log")?;
            for group in reader.list_groups()? {
                writeln!(out, "{}", group)?;
            }
        }
        Command::Channels { group, files } => {
            let reader = open_reader(files, &settings).context("failed to open log")?;
            for (i, info) in reader.list_channels(group)?.iter().enumerate() {
                match info.value_type {
                    Some(vt) => writeln!(out, "{}\t{}\t{}", i, info.display_name(), vt)?,
                    None => writeln!(out, "{}\t{}", i, info.display_name())?,
                }
            }
        }
        Command::Dump {
            group,
            channel,
            format,
            from_unit,
            to_unit,
            files,
        } => {
            let conversion = match (from_unit, to_unit) {
                (Some(from), Some(to)) => match UnitConversion::between(from, to) {
                    Some(conv) => Some(conv),
                    None => bail!("cannot convert from '{}' to '{}'", from, to),
                },
                _ => None,
            };

            let reader = open_reader(files, &settings).context("failed to open log")?;
            let id = reader
                .resolve_channel(group, channel)
                .with_context(|| format!("failed to find '{}' in '{}'", channel, group))?;
            let series = reader
                .channel_series(group, &id)
                .with_context(|| format!("failed to read '{}' of '{}'", channel, group))?;
            let trace = present(
                &series,
                conversion.as_ref(),
                &settings.forced_boolean_channels,
            );

            match format {
                OutputFormat::Csv => write_csv(&mut out, &trace)?,
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut out, &trace)?;
                    writeln!(out)?;
                }
            }
        }
    }

    Ok(())
}
