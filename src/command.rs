//! # Command Builder Module
//!
//! Questo modulo costruisce le invocazioni di ffmpeg/ffprobe.
//!
//! ## Responsabilità:
//! - Definisce `CommandSpec` (programma + argomenti + file prodotto)
//! - Costruisce il remux veloce (`-c copy -movflags +faststart`)
//! - Costruisce la ricodifica sicura per WhatsApp Business:
//!    - Codec video: libx264, profilo baseline, level 3.1, yuv420p
//!    - Codec audio: AAC 128k
//!    - `+faststart` per spostare il moov atom in testa al file
//! - Costruisce il probe non distruttivo con ffprobe
//!
//! Tutte le funzioni sono pure: nessun accesso al filesystem, nessun processo.
//!
//! ## Esempio:
//! ```ignore
//! let spec = build_remux(&ffmpeg, Path::new("in.mov"), Path::new("out.mp4"));
//! supervisor.start(spec)?;
//! ```

use crate::args;
use crate::utils::{path_arg, to_string_vec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed encoder settings accepted by the WhatsApp Business media validator
#[rustfmt::skip]
pub const SAFE_ENCODE_ARGS: [&str; 14] = [
    "-c:v", "libx264",
    "-profile:v", "baseline",
    "-level", "3.1",
    "-pix_fmt", "yuv420p",
    "-c:a", "aac",
    "-b:a", "128k",
    "-movflags", "+faststart",
];

#[rustfmt::skip]
const PROBE_ARGS: [&str; 7] = [
    "-v", "error",
    "-show_entries", "format=format_name,format_long_name",
    "-show_streams",
    "-of", "default=noprint_wrappers=1",
];

/// How the input is turned into an MP4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    /// Copy streams, move the moov atom to the front
    #[default]
    Remux,
    /// Re-encode to H.264 baseline + AAC
    SafeEncode,
}

impl ConversionMode {
    pub fn from_force_encode(force: bool) -> Self {
        if force {
            Self::SafeEncode
        } else {
            Self::Remux
        }
    }

    /// Human description used in the run log
    pub fn description(&self) -> &'static str {
        match self {
            Self::Remux => "Fast re-mux to MP4 with +faststart",
            Self::SafeEncode => "Clean re-encode to safe profile",
        }
    }
}

/// A fully assembled external command. Consumed once by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// File the command writes, if any
    pub output: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, T>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self {
            program: program.into(),
            args: to_string_vec(args),
            output: None,
        }
    }

    /// Record the file this command writes
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Re-mux only: copy every stream and put the moov atom at the front
pub fn build_remux(ffmpeg: &Path, src: &Path, dst: &Path) -> CommandSpec {
    let args = args![
        "-y",
        "-i",
        path_arg(src),
        "-c",
        "copy",
        "-movflags",
        "+faststart",
        path_arg(dst),
    ];

    CommandSpec::new(ffmpeg, args).with_output(dst)
}

/// Full re-encode to the constrained compatibility profile
pub fn build_safe_encode(ffmpeg: &Path, src: &Path, dst: &Path) -> CommandSpec {
    let mut args = args!["-y", "-i", path_arg(src)];
    args.extend(to_string_vec(SAFE_ENCODE_ARGS));
    args.push(path_arg(dst));

    CommandSpec::new(ffmpeg, args).with_output(dst)
}

/// Dispatch on the requested mode
pub fn build(ffmpeg: &Path, src: &Path, dst: &Path, mode: ConversionMode) -> CommandSpec {
    match mode {
        ConversionMode::Remux => build_remux(ffmpeg, src, dst),
        ConversionMode::SafeEncode => build_safe_encode(ffmpeg, src, dst),
    }
}

/// Non-destructive container/stream summary with ffprobe
pub fn build_probe(ffprobe: &Path, src: &Path) -> CommandSpec {
    let mut args = to_string_vec(PROBE_ARGS);
    args.push(path_arg(src));
    CommandSpec::new(ffprobe, args)
}
