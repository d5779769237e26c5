use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use rtcm::{Decoder, Registry, Synchronizer};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    io::{stdout, Write},
    path::Path,
    sync::Arc,
};
use tracing::{debug, warn};

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

#[derive(Default, Debug, Clone, Serialize)]
struct Summary {
    count: usize,
    description: String,
    unknown: bool,
    decode_errors: usize,
}

#[derive(Default, Debug, Clone, Serialize)]
struct Info {
    filename: String,
    total_frames: usize,
    checksum_failures: usize,
    truncated: bool,
    discarded_bytes: usize,
    ubx_frames: usize,
    nmea_sentences: usize,
    messages: BTreeMap<String, Summary>,
}

fn summarize(fpath: &Path, registry: Arc<Registry>) -> Result<Info> {
    let reader = std::fs::File::open(fpath).context("opening input")?;
    let decoder = Decoder::new(registry.clone());
    let mut sync = Synchronizer::new(reader);
    let mut info = Info {
        filename: fpath.to_string_lossy().to_string(),
        ..Default::default()
    };

    loop {
        let frame = match sync.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(rtcm::Error::TruncatedStream { wanted, got }) => {
                warn!(wanted, got, "input ends with a partial frame");
                info.truncated = true;
                break;
            }
            Err(err) => return Err(err).context("reading frames"),
        };
        info.total_frames += 1;
        if !frame.is_valid() {
            debug!(offset = frame.offset, "invalid checksum");
            info.checksum_failures += 1;
            continue;
        }

        let identity = match frame.identity() {
            Ok(id) => id,
            Err(err) => {
                debug!(offset = frame.offset, %err, "frame too short for identity");
                continue;
            }
        };
        let summary = info.messages.entry(identity.clone()).or_default();
        summary.count += 1;
        match decoder.parse(&frame.data) {
            Ok(msg) => summary.unknown = msg.is_unknown(),
            Err(err) => {
                debug!(offset = frame.offset, %err, "decode failed");
                summary.decode_errors += 1;
            }
        }
        if summary.description.is_empty() {
            summary.description = registry.description(&identity).unwrap_or_default().to_string();
        }
    }

    let stats = sync.stats();
    info.discarded_bytes = stats.discarded_bytes;
    info.ubx_frames = stats.ubx_frames;
    info.nmea_sentences = stats.nmea_sentences;

    Ok(info)
}

pub fn info(fpath: &Path, format: &Format, registry: Arc<Registry>) -> Result<()> {
    let info = summarize(fpath, registry)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
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
        let num = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>num$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("registering template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================================
Frames:     {{ total_frames }}
Bad CRC:    {{ checksum_failures }}
Truncated:  {{ truncated }}
Discarded:  {{ discarded_bytes }} bytes
UBX:        {{ ubx_frames }}
NMEA:       {{ nmea_sentences }}
-----------------------------------------------------------------------------------------------
Type        Count   Errors   Description
-----------------------------------------------------------------------------------------------
{{ #each messages }}{{ lpad 8 @key }}  {{ lpad 7 count }}  {{ lpad 7 decode_errors }}   {{ #if unknown }}Not_Yet_Implemented{{ else }}{{ description }}{{ /if }}
{{/each }}
";
