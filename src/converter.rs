//! # Converter
//!
//! Orchestratore chiamato dalla shell di presentazione.
//!
//! ## Responsabilità:
//! - `probe()`: riepilogo ffprobe del file di input, scritto nel log
//! - `convert()`: validazione, ricerca di ffmpeg, costruzione del comando, avvio del run
//! - `stop_current()`: richiesta di terminazione del run attivo
//! - `kill_current()`: terminazione forzata, se ffmpeg non risponde allo stop
//! - `controls()`: quali comandi la shell deve abilitare
//! - `conclude()`: messaggi finali (esito, dimensione output, suggerimenti)
//!
//! ## Flusso di esecuzione:
//! 1. La shell crea un `ConversionRequest`
//! 2. `convert()` valida input/output e trova ffmpeg prima di avviare qualsiasi processo
//! 3. Il `ProcessSupervisor` avvia ffmpeg e riempie il `LogSink`
//! 4. La shell svuota il `LogSink` a intervalli fissi
//! 5. Al segnale terminale la shell chiama `conclude()`
//!
//! Gli errori di validazione non avviano mai un run; i controlli tornano
//! abilitati su ogni percorso di uscita perché derivano dallo stato del run.

use crate::command::{self, ConversionMode};
use crate::config::Config;
use crate::error::ConvertError;
use crate::log_sink::LogSink;
use crate::probe;
use crate::supervisor::{ProcessSupervisor, RunHandle, RunState};
use crate::tool_resolver::{ToolPathResolver, FFMPEG};
use crate::utils::format_size_mb;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the user asked for, captured when the conversion is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: ConversionMode,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, mode: ConversionMode) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mode,
        }
    }

    /// Checks done before anything is spawned
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.input.as_os_str().is_empty() || !self.input.exists() {
            return Err(ConvertError::InputMissing(self.input.clone()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ConvertError::OutputPathUnset);
        }
        Ok(())
    }
}

/// Enable/disable hints for the shell's trigger controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHints {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

/// Core API used by the presentation shell
pub struct Converter {
    resolver: ToolPathResolver,
    supervisor: ProcessSupervisor,
    sink: LogSink,
}

impl Converter {
    pub fn new(config: &Config) -> Self {
        Self::with_resolver(ToolPathResolver::from_config(config))
    }

    pub fn with_resolver(resolver: ToolPathResolver) -> Self {
        let sink = LogSink::new();
        Self {
            resolver,
            supervisor: ProcessSupervisor::new(sink.clone()),
            sink,
        }
    }

    /// Queue the display context drains
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn current(&self) -> Option<&RunHandle> {
        self.supervisor.current()
    }

    /// Summarise `input` with ffprobe and write the summary to the log
    pub async fn probe(&self, input: &Path) -> Result<String, ConvertError> {
        if input.as_os_str().is_empty() {
            return Err(ConvertError::InputMissing(input.to_path_buf()));
        }

        self.sink.push(format!("Probing file: {}", input.display()));
        let info = probe::probe(&self.resolver, input).await;
        for line in info.lines() {
            self.sink.push(line);
        }
        self.sink.push("");
        Ok(info)
    }

    /// Validate `request` and start ffmpeg on it
    pub fn convert(&mut self, request: &ConversionRequest) -> Result<RunHandle, ConvertError> {
        request.validate()?;

        if self.supervisor.is_busy() {
            return Err(ConvertError::RunActive);
        }

        let Some(ffmpeg) = self.resolver.ffmpeg() else {
            warn!("ffmpeg not found, conversion not started");
            self.sink.push("ffmpeg not found on PATH.");
            self.sink.push("Install ffmpeg and restart this app.");
            for line in ToolPathResolver::install_instructions() {
                self.sink.push(line);
            }
            self.sink.push("");
            return Err(ConvertError::BinaryNotFound(FFMPEG.to_string()));
        };

        let spec = command::build(&ffmpeg, &request.input, &request.output, request.mode);

        info!(
            "Converting {} -> {} ({:?})",
            request.input.display(),
            request.output.display(),
            request.mode
        );
        self.sink.push(format!("Mode: {}", request.mode.description()));
        self.sink.push(format!("Using ffmpeg: {}", ffmpeg.display()));
        self.sink.push("Command:");
        self.sink.push(spec.to_string());
        self.sink.push("");

        self.supervisor.start(spec)
    }

    /// Ask the running ffmpeg to stop. Returns whether a request was sent.
    pub fn stop_current(&self) -> bool {
        if self.supervisor.cancel() {
            self.sink.push("");
            self.sink.push("Requested stop. Waiting for ffmpeg to exit...");
            true
        } else {
            debug!("Stop requested with no running conversion");
            false
        }
    }

    /// Force the current ffmpeg down. Returns whether it was still live.
    pub fn kill_current(&self) -> bool {
        if self.supervisor.kill() {
            self.sink.push("Killing ffmpeg...");
            true
        } else {
            false
        }
    }

    pub fn controls(&self) -> ControlHints {
        let busy = self.supervisor.is_busy();
        ControlHints {
            start_enabled: !busy,
            stop_enabled: busy,
        }
    }

    /// Report the outcome of a finished run.
    ///
    /// Returns the output size when the run succeeded and the file could be
    /// read; a failed stat is not an error.
    pub fn conclude(&self, handle: &RunHandle) -> Result<Option<u64>, ConvertError> {
        let state = handle.state();
        if let Err(e) = state.to_result() {
            match state {
                RunState::Completed {
                    code,
                    cancelled: true,
                } => {
                    self.sink.push("");
                    self.sink.push(format!("ffmpeg stopped with code {}", code));
                }
                RunState::Completed { code, .. } => {
                    self.sink.push("");
                    self.sink.push(format!("ffmpeg exited with code {}", code));
                }
                RunState::Failed { reason } => {
                    self.sink.push(format!("ffmpeg could not be started: {}", reason));
                    self.sink
                        .push("Check that the ffmpeg path points to a working executable.");
                }
                RunState::Starting | RunState::Running | RunState::Cancelling => {}
            }
            return Err(e);
        }

        self.sink.push("");
        self.sink.push("Done. Output saved.");

        let size = handle
            .output()
            .and_then(|output| std::fs::metadata(output).ok())
            .map(|meta| meta.len());
        if let Some(size) = size {
            self.sink.push(format!("Output size: {}", format_size_mb(size)));
        }

        self.sink.push("");
        self.sink.push("If Meta still rejects the file:");
        self.sink.push("- Run again with --safe to force a clean re-encode");
        self.sink.push("- Ensure you upload with Content-Type: video/mp4");

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::LogEvent;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lines(sink: &LogSink) -> Vec<String> {
        sink.drain()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Line(line) => Some(line.text),
                LogEvent::Finished(_) => None,
            })
            .collect()
    }

    fn converter_with_ffmpeg(ffmpeg: PathBuf) -> Converter {
        Converter::new(&Config {
            ffmpeg_path: Some(ffmpeg),
            ..Config::default()
        })
    }

    #[test]
    fn test_request_validation() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"not really a video").unwrap();

        let missing = ConversionRequest::new(dir.path().join("nope.mov"), "out.mp4", ConversionMode::Remux);
        assert!(matches!(missing.validate(), Err(ConvertError::InputMissing(_))));

        let empty_input = ConversionRequest::new("", "out.mp4", ConversionMode::Remux);
        assert!(matches!(empty_input.validate(), Err(ConvertError::InputMissing(_))));

        let no_output = ConversionRequest::new(&input, "", ConversionMode::Remux);
        assert!(matches!(no_output.validate(), Err(ConvertError::OutputPathUnset)));

        let ok = ConversionRequest::new(&input, dir.path().join("out.mp4"), ConversionMode::SafeEncode);
        assert!(ok.validate().is_ok());
    }

    #[tokio::test]
    async fn test_validation_error_starts_nothing() {
        let mut converter = Converter::with_resolver(ToolPathResolver::default());
        let request = ConversionRequest::new("/no/such/input.mov", "out.mp4", ConversionMode::Remux);

        assert!(matches!(
            converter.convert(&request),
            Err(ConvertError::InputMissing(_))
        ));
        assert!(converter.current().is_none());
        assert_eq!(
            converter.controls(),
            ControlHints {
                start_enabled: true,
                stop_enabled: false
            }
        );
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_blocks_start() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"x").unwrap();

        let resolver = ToolPathResolver::default()
            .with_search_path(dir.path())
            .with_tools_dir(dir.path());
        let mut converter = Converter::with_resolver(resolver);
        let request = ConversionRequest::new(&input, dir.path().join("out.mp4"), ConversionMode::Remux);

        assert!(matches!(
            converter.convert(&request),
            Err(ConvertError::BinaryNotFound(_))
        ));
        assert!(converter.current().is_none());
        assert!(lines(converter.sink()).iter().any(|l| l.contains("ffmpeg not found")));
    }

    #[tokio::test]
    async fn test_probe_requires_input() {
        let converter = Converter::with_resolver(ToolPathResolver::default());
        assert!(matches!(
            converter.probe(Path::new("")).await,
            Err(ConvertError::InputMissing(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_reports_size() {
        let fake_ffmpeg = which::which("true").unwrap();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        let output = dir.path().join("in_waba.mp4");
        std::fs::write(&input, b"x").unwrap();
        std::fs::write(&output, vec![0u8; 2048]).unwrap();

        let mut converter = converter_with_ffmpeg(fake_ffmpeg.clone());
        let request = ConversionRequest::new(&input, &output, ConversionMode::SafeEncode);
        let handle = converter.convert(&request).unwrap();

        let state = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();
        assert!(state.is_terminal());
        assert!(converter.controls().start_enabled);
        assert!(!converter.controls().stop_enabled);

        assert_eq!(converter.conclude(&handle).unwrap(), Some(2048));

        let log = lines(converter.sink());
        assert_eq!(log[0], "Mode: Clean re-encode to safe profile");
        assert_eq!(log[1], format!("Using ffmpeg: {}", fake_ffmpeg.display()));
        assert!(log.iter().any(|l| l.contains("-profile:v baseline")));
        assert!(log.iter().any(|l| l == "Done. Output saved."));
        assert!(log.iter().any(|l| l == "Output size: 0.00 MB"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"x").unwrap();

        let mut converter = converter_with_ffmpeg(which::which("true").unwrap());
        let request = ConversionRequest::new(&input, dir.path().join("never-written.mp4"), ConversionMode::Remux);
        let handle = converter.convert(&request).unwrap();
        handle.wait().await;

        assert_eq!(converter.conclude(&handle).unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_processor_failure() {
        // `sh -y ...` rejects the unknown option and exits non-zero.
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"x").unwrap();

        let mut converter = converter_with_ffmpeg(PathBuf::from("/bin/sh"));
        let request = ConversionRequest::new(&input, dir.path().join("out.mp4"), ConversionMode::Remux);
        let handle = converter.convert(&request).unwrap();
        handle.wait().await;

        let err = converter.conclude(&handle).unwrap_err();
        let ConvertError::ProcessorExitFailure(code) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_ne!(code, 0);
        assert!(lines(converter.sink())
            .iter()
            .any(|l| l == &format!("ffmpeg exited with code {}", code)));
    }

    #[test]
    fn test_stop_without_run_is_noop() {
        let converter = Converter::with_resolver(ToolPathResolver::default());
        assert!(!converter.stop_current());
        assert!(!converter.kill_current());
        assert!(converter.sink().is_empty());
    }

    #[cfg(unix)]
    fn write_fake_ffmpeg(dir: &Path, body: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    /// Start `request`, retrying while a freshly written script is still "busy"
    /// because a concurrently forked test process holds it open.
    #[cfg(unix)]
    fn start_fresh_script(converter: &mut Converter, request: &ConversionRequest) -> RunHandle {
        for _ in 0..10 {
            let handle = converter.convert(request).unwrap();
            match handle.state() {
                RunState::Failed { reason } if reason.contains("busy") => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                _ => return handle,
            }
        }
        panic!("fake ffmpeg stayed busy");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_running_conversion() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"x").unwrap();
        let fake_ffmpeg = write_fake_ffmpeg(dir.path(), "exec sleep 30", 0o755);

        let mut converter = converter_with_ffmpeg(fake_ffmpeg);
        let request = ConversionRequest::new(&input, dir.path().join("out.mp4"), ConversionMode::Remux);
        let handle = start_fresh_script(&mut converter, &request);

        assert_eq!(
            converter.controls(),
            ControlHints {
                start_enabled: false,
                stop_enabled: true
            }
        );
        assert!(matches!(converter.convert(&request), Err(ConvertError::RunActive)));

        assert!(converter.stop_current());
        let state = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("stopped conversion did not terminate");
        assert_eq!(
            state,
            RunState::Completed {
                code: -15,
                cancelled: true
            }
        );
        assert_eq!(
            converter.controls(),
            ControlHints {
                start_enabled: true,
                stop_enabled: false
            }
        );

        assert!(matches!(
            converter.conclude(&handle),
            Err(ConvertError::CancelRequested { code: -15 })
        ));
        let log = lines(converter.sink());
        assert!(log
            .iter()
            .any(|l| l == "Requested stop. Waiting for ffmpeg to exit..."));
        assert_eq!(log.last().map(String::as_str), Some("ffmpeg stopped with code -15"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unrunnable_ffmpeg_reports_reason() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"x").unwrap();
        // Present but not executable: resolves, then fails to spawn.
        let fake_ffmpeg = write_fake_ffmpeg(dir.path(), "exit 0", 0o644);

        let mut converter = converter_with_ffmpeg(fake_ffmpeg);
        let request = ConversionRequest::new(&input, dir.path().join("out.mp4"), ConversionMode::Remux);
        let handle = converter.convert(&request).unwrap();

        let state = handle.wait().await;
        let RunState::Failed { reason } = state else {
            panic!("unexpected state: {state:?}");
        };
        assert!(converter.controls().start_enabled);

        let err = converter.conclude(&handle).unwrap_err();
        assert!(matches!(&err, ConvertError::SpawnFailure(r) if *r == reason));

        let log = lines(converter.sink());
        assert!(log
            .iter()
            .any(|l| l == &format!("ffmpeg could not be started: {}", reason)));
        assert!(!log.iter().any(|l| l.contains("install")));
    }
}
