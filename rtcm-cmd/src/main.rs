mod describe;
mod dump;
mod info;

use std::io::stderr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rtcm::{MsmLabel, Registry};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Schema file to merge with the built-in message schemas.
    #[arg(short, long, global = true, value_name = "path")]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show message counts for an RTCM3 file.
    Info {
        /// Input RTCM3 file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,
    },
    /// Decode and print each message in an RTCM3 file.
    ///
    /// Frames that fail their checksum or cannot be decoded are logged and skipped.
    Dump {
        /// Input RTCM3 file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: dump::Format,

        /// Also print a hex table of each frame.
        #[arg(long, action)]
        hex: bool,

        /// Output raw integer values rather than applying field scale factors.
        #[arg(long, action)]
        no_scaling: bool,

        /// Decode frames even if their checksum is invalid.
        #[arg(long, action)]
        no_validate: bool,

        /// How MSM signals are labelled.
        #[arg(short, long, default_value = "rinex")]
        label: dump::Label,
    },
    /// Show the fields of a message type.
    Describe {
        /// Message identity, e.g., 1077 or 4076_201. If not provided all known message
        /// types are listed.
        identity: Option<String>,
    },
}

fn load_registry(path: Option<&Path>) -> Result<Arc<Registry>> {
    match path {
        Some(path) => {
            let registry = Registry::with_file(path, true)
                .with_context(|| format!("loading schemas from {path:?}"))?;
            Ok(Arc::new(registry))
        }
        None => Ok(Registry::builtin()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("RTCM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let registry = load_registry(cli.schema.as_deref())?;

    match &cli.command {
        Commands::Info { input, format } => info::info(input, format, registry),
        Commands::Dump {
            input,
            format,
            hex,
            no_scaling,
            no_validate,
            label,
        } => {
            let label = match label {
                dump::Label::Rinex => MsmLabel::Rinex,
                dump::Label::Band => MsmLabel::Band,
                dump::Label::None => MsmLabel::None,
            };
            let options = rtcm::DecodeOptions::builder()
                .validate(!no_validate)
                .scaling(!no_scaling)
                .msm_label(label)
                .build();
            dump::dump(input, format, *hex, options, registry)
        }
        Commands::Describe { identity } => describe::describe(identity.as_deref(), &registry),
    }
}
