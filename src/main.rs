//! # WABA Video Converter - Main Entry Point
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, --safe, --probe, ...)
//! 2. Configura il logging (`RUST_LOG`, oppure WARN / DEBUG con --verbose)
//! 3. Carica la configurazione e applica i flag della CLI
//! 4. Probe opzionale dell'input con ffprobe
//! 5. Avvia la conversione e mostra il log fino alla fine del run
//!
//! ## Esempio di utilizzo:
//! ```bash
//! waba-convert clip.mov --safe -o clip_waba.mp4
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use waba_convert::json_output::JsonMessage;
use waba_convert::progress::{watch_run, LogView};
use waba_convert::utils::suggest_output_path;
use waba_convert::{Config, ConversionMode, ConversionRequest, Converter, ToolPathResolver};

#[derive(Parser)]
#[command(name = "waba-convert")]
#[command(about = "Convert a video into an MP4 the WhatsApp Business upload validator accepts")]
struct Args {
    /// Input video
    #[arg(required_unless_present = "tools")]
    input: Option<PathBuf>,

    /// Output file (default: <input>_waba.mp4 next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force clean re-encode (H.264 baseline + AAC + faststart)
    #[arg(long, alias = "force-encode")]
    safe: bool,

    /// Print an ffprobe summary of the input before converting
    #[arg(long)]
    probe: bool,

    /// Only probe the input, do not convert
    #[arg(long)]
    probe_only: bool,

    /// Show where ffmpeg and ffprobe were found and exit
    #[arg(long)]
    tools: bool,

    /// Emit JSON events on stdout instead of a text log
    #[arg(long)]
    json: bool,

    /// Configuration file (default: <config dir>/waba-convert/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How often the log is refreshed, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            Config::from_file(&path).await?
        }
        None => Config::default(),
    };
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    config.json_output |= args.json;
    config.validate()?;

    if args.tools {
        print!("{}", ToolPathResolver::from_config(&config).get_tools_report());
        return Ok(());
    }

    let input = args
        .input
        .ok_or_else(|| anyhow::anyhow!("No input video given"))?;

    let mut converter = Converter::new(&config);
    let view = LogView::new(config.json_output);

    if args.probe || args.probe_only {
        let text = converter.probe(&input).await?;
        if config.json_output {
            converter.sink().drain();
            JsonMessage::Probe {
                input: input.clone(),
                text,
            }
            .emit();
        } else {
            view.render(converter.sink().drain());
        }
        if args.probe_only {
            return Ok(());
        }
    }

    let output = args
        .output
        .unwrap_or_else(|| suggest_output_path(&input, &config.output_suffix));
    let request = ConversionRequest::new(input, output, ConversionMode::from_force_encode(args.safe));

    if config.json_output {
        JsonMessage::Start {
            input: request.input.clone(),
            output: request.output.clone(),
            mode: request.mode,
        }
        .emit();
    }

    let handle = match converter.convert(&request) {
        Ok(handle) => handle,
        Err(e) => {
            view.render(converter.sink().drain());
            view.error(&e);
            return Err(e.into());
        }
    };

    watch_run(&converter, &handle, &view, config.poll_interval()).await?;

    Ok(())
}
