//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della conversione.
//!
//! ## Categorie di errori:
//! - `BinaryNotFound`: ffmpeg/ffprobe non trovato (blocca la conversione, non il probe)
//! - `InputMissing` / `OutputPathUnset`: validazione prima dello spawn
//! - `SpawnFailure`: il sistema operativo non riesce ad avviare il processo
//! - `ProcessorExitFailure`: ffmpeg è partito ma è uscito con codice != 0
//! - `CancelRequested`: run interrotto dall'utente (codice di uscita riportato)
//! - `RunActive`: start chiamato mentre un altro run è ancora attivo
//!
//! ## Esempio:
//! ```ignore
//! if request.output.as_os_str().is_empty() {
//!     return Err(ConvertError::OutputPathUnset);
//! }
//! ```

use std::path::PathBuf;

/// Errors surfaced by the conversion core
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found on PATH or next to the application")]
    BinaryNotFound(String),

    #[error("Input file does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("No output file selected")]
    OutputPathUnset,

    #[error("Failed to start process: {0}")]
    SpawnFailure(String),

    #[error("ffmpeg exited with code {0}")]
    ProcessorExitFailure(i32),

    #[error("Conversion stopped by user (exit code {code})")]
    CancelRequested { code: i32 },

    #[error("A conversion is already running")]
    RunActive,
}

impl ConvertError {
    /// True for errors raised before anything was spawned
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BinaryNotFound(_) | Self::InputMissing(_) | Self::OutputPathUnset
        )
    }
}
