//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da altri programmi.
//!
//! ## Tipi di messaggi (uno per riga su stdout):
//! - `start`: inizio della conversione (input, output, modalità)
//! - `log`: una riga del log di ffmpeg, con il suo numero di sequenza
//! - `probe`: riepilogo ffprobe del file di input
//! - `complete`: stato terminale del run e dimensione dell'output
//! - `error`: errore prima o durante la conversione

use crate::command::ConversionMode;
use crate::log_sink::LogLine;
use crate::supervisor::RunState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        input: PathBuf,
        output: PathBuf,
        mode: ConversionMode,
    },

    Log {
        seq: u64,
        text: String,
    },

    Probe {
        input: PathBuf,
        text: String,
    },

    Complete {
        success: bool,
        run: RunState,
        output_size: Option<u64>,
    },

    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn log(line: &LogLine) -> Self {
        Self::Log {
            seq: line.seq,
            text: line.text.clone(),
        }
    }

    pub fn complete(run: RunState, output_size: Option<u64>) -> Self {
        Self::Complete {
            success: run.to_result().is_ok(),
            run,
            output_size,
        }
    }

    pub fn error(message: impl ToString, details: Option<String>) -> Self {
        Self::Error {
            message: message.to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_message_shape() {
        let msg = JsonMessage::Start {
            input: PathBuf::from("in.mov"),
            output: PathBuf::from("in_waba.mp4"),
            mode: ConversionMode::SafeEncode,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "start",
                "input": "in.mov",
                "output": "in_waba.mp4",
                "mode": "safe_encode"
            })
        );
    }

    #[test]
    fn test_complete_message_carries_exit_code() {
        let msg = JsonMessage::complete(
            RunState::Completed {
                code: 7,
                cancelled: false,
            },
            None,
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["success"], false);
        assert_eq!(value["run"]["state"], "completed");
        assert_eq!(value["run"]["code"], 7);
    }

    #[test]
    fn test_log_message_parses_back() {
        let line = LogLine {
            seq: 3,
            text: "frame=  120 fps=60".to_string(),
        };
        let encoded = serde_json::to_string(&JsonMessage::log(&line)).unwrap();
        let decoded: JsonMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, JsonMessage::log(&line));
    }
}
