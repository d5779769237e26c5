use anyhow::{Context, Result};
use rtcm::{helpers::hextable, DecodeOptions, Decoder, ErrorPolicy, Registry, RtcmReader};
use serde::Serialize;
use std::{
    io::{stdout, BufWriter, Write},
    path::Path,
    sync::Arc,
};
use tracing::warn;

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

#[derive(Debug, Clone)]
pub enum Label {
    Rinex,
    Band,
    None,
}

impl clap::ValueEnum for Label {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Rinex, Self::Band, Self::None]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Rinex => Some(clap::builder::PossibleValue::new("rinex")),
            Self::Band => Some(clap::builder::PossibleValue::new("band")),
            Self::None => Some(clap::builder::PossibleValue::new("none")),
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    offset: usize,
    message: &'a rtcm::Message,
}

pub fn dump(
    fpath: &Path,
    format: &Format,
    hex: bool,
    options: DecodeOptions,
    registry: Arc<Registry>,
) -> Result<()> {
    let file = std::fs::File::open(fpath).context("opening input")?;
    let reader = RtcmReader::new(file)
        .with_decoder(Decoder::new(registry).with_options(options))
        .with_policy(ErrorPolicy::Log)
        .with_handler(|err| warn!(%err, "skipping frame"));

    let mut out = BufWriter::new(stdout().lock());
    for zult in reader {
        let (frame, msg) = zult.context("reading frames")?;
        let Some(msg) = msg else {
            continue;
        };
        match format {
            Format::Text => writeln!(out, "{msg}").context("writing to stdout")?,
            Format::Json => {
                let record = Record {
                    offset: frame.offset,
                    message: &msg,
                };
                serde_json::to_writer(&mut out, &record).context("serializing to json")?;
                writeln!(out).context("writing to stdout")?;
            }
        }
        if hex {
            write!(out, "{}", hextable(&frame.data, 8)).context("writing to stdout")?;
        }
    }
    out.flush().context("writing to stdout")
}
