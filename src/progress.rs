//! # Progress Display Module
//!
//! Questo modulo è il contesto di visualizzazione della CLI.
//!
//! ## Responsabilità:
//! - Svuota il `LogSink` a intervalli fissi (default 80ms) senza mai bloccarsi
//! - Stampa le righe del log sopra uno spinner `indicatif`
//! - Le righe di progresso di ffmpeg (`frame=...`, `size=...`) aggiornano lo spinner
//! - In modalità JSON emette un messaggio per riga invece del testo
//! - Ctrl-C chiede lo stop del run (come il pulsante Stop); un secondo Ctrl-C lo termina forzatamente
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] frame=  301 fps= 48 q=28.0 size=    1024kB time=00:00:10.03
//! ```

use crate::converter::Converter;
use crate::error::ConvertError;
use crate::json_output::JsonMessage;
use crate::log_sink::LogEvent;
use crate::supervisor::{RunHandle, RunState};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

/// Renders drained log events, as text or JSON
pub enum LogView {
    Human { bar: ProgressBar },
    Json,
}

impl LogView {
    pub fn new(json_output: bool) -> Self {
        if json_output {
            return Self::Json;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self::Human { bar }
    }

    /// Start animating the spinner
    pub fn begin(&self, message: &str) {
        if let Self::Human { bar } = self {
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
        }
    }

    /// Render a batch; returns the terminal state if the batch contained one
    pub fn render(&self, events: Vec<LogEvent>) -> Option<RunState> {
        let mut finished = None;
        for event in events {
            match event {
                LogEvent::Line(line) => match self {
                    Self::Json => JsonMessage::log(&line).emit(),
                    Self::Human { bar } => {
                        if is_progress_line(&line.text) {
                            bar.set_message(line.text.trim().to_string());
                        } else if bar.is_hidden() || bar.is_finished() {
                            eprintln!("{}", line.text);
                        } else {
                            bar.println(&line.text);
                        }
                    }
                },
                LogEvent::Finished(state) => finished = Some(state),
            }
        }
        finished
    }

    /// Stop the spinner, leaving `message` on screen
    pub fn finish(&self, message: &str) {
        if let Self::Human { bar } = self {
            bar.finish_with_message(message.to_string());
        }
    }

    pub fn error(&self, err: &ConvertError) {
        match self {
            Self::Json => JsonMessage::error(err, None).emit(),
            Self::Human { bar } => bar.abandon_with_message(format!("❌ {}", err)),
        }
    }
}

/// ffmpeg's periodic status line
fn is_progress_line(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("frame=") || text.starts_with("size=")
}

/// Drain the converter's log until `handle` finishes, then conclude the run.
///
/// The first Ctrl-C requests a stop, the second kills ffmpeg; the loop keeps
/// draining until the process is gone.
pub async fn watch_run(
    converter: &Converter,
    handle: &RunHandle,
    view: &LogView,
    poll_interval: Duration,
) -> Result<Option<u64>, ConvertError> {
    let mut ticker = tokio::time::interval(poll_interval);
    let mut interrupts = 0u8;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    view.begin(&format!("Running {}", handle.program()));

    let state = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(state) = view.render(converter.sink().drain()) {
                    break state;
                }
            }
            _ = &mut ctrl_c, if interrupts < 2 => {
                interrupts += 1;
                if interrupts == 1 {
                    debug!("Ctrl-C received, stopping conversion");
                    converter.stop_current();
                } else {
                    debug!("Second Ctrl-C received, killing ffmpeg");
                    converter.kill_current();
                }
                ctrl_c.set(tokio::signal::ctrl_c());
            }
        }
    };

    let outcome = converter.conclude(handle);
    view.render(converter.sink().drain());

    match &outcome {
        Ok(size) => {
            if let LogView::Json = view {
                JsonMessage::complete(state, *size).emit();
            }
            view.finish("✅ Done");
        }
        Err(e) => {
            if let LogView::Json = view {
                JsonMessage::complete(state, None).emit();
            }
            view.error(e);
        }
    }

    outcome
}
