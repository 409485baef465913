//! # WABA Video Converter Library
//!
//! Converte un video qualsiasi in un MP4 accettato dal validatore media di
//! WhatsApp Business, delegando tutta la codifica a ffmpeg.
//!
//! ## Architettura dei moduli:
//! - `tool_resolver`: Ricerca di ffmpeg/ffprobe (PATH, poi tool inclusi nell'app)
//! - `command`: Costruzione degli argomenti (remux veloce o ricodifica sicura)
//! - `supervisor`: Avvio di ffmpeg, lettura di stderr, cancellazione
//! - `log_sink`: Coda FIFO tra il worker e il contesto di visualizzazione
//! - `probe`: Riepilogo ffprobe dell'input
//! - `converter`: API usata dalla shell (`probe`, `convert`, `stop_current`)
//! - `progress` / `json_output`: Visualizzazione testuale o JSON
//! - `config` / `error`: Configurazione e tipi di errore
//!
//! ## Utilizzo:
//! ```ignore
//! use waba_convert::{Config, ConversionMode, ConversionRequest, Converter};
//!
//! let mut converter = Converter::new(&Config::default());
//! let request = ConversionRequest::new("in.mov", "in_waba.mp4", ConversionMode::Remux);
//! let handle = converter.convert(&request)?;
//! let state = handle.wait().await;
//! converter.conclude(&handle)?;
//! ```

pub mod command;
pub mod config;
pub mod converter;
pub mod error;
pub mod json_output;
pub mod log_sink;
pub mod probe;
pub mod progress;
pub mod supervisor;
pub mod tool_resolver;
pub mod utils;

pub use command::{CommandSpec, ConversionMode};
pub use config::Config;
pub use converter::{ControlHints, ConversionRequest, Converter};
pub use error::ConvertError;
pub use log_sink::{LogEvent, LogLine, LogSink};
pub use supervisor::{ProcessSupervisor, RunHandle, RunState};
pub use tool_resolver::ToolPathResolver;
