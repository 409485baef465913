//! # Process Supervisor Module
//!
//! Questo modulo avvia ffmpeg come sottoprocesso e ne segue il ciclo di vita.
//!
//! ## Responsabilità:
//! - Spawn del binario con gli argomenti di un `CommandSpec`
//! - Lettura di stderr riga per riga (ffmpeg scrive lì il progresso)
//! - Inoltro di ogni riga al `LogSink`, in ordine
//! - Attesa del codice di uscita e segnale terminale `LogEvent::Finished`
//! - Richiesta di terminazione (SIGTERM su Unix) su `cancel()`
//! - Terminazione forzata (SIGKILL) su `kill()`, per un ffmpeg che ignora SIGTERM
//!
//! ## Stati di un run:
//! ```text
//! Starting ──spawn ok──▶ Running ──exit──▶ Completed { code, cancelled: false }
//!    │                      │
//!    │              cancel() / kill()
//!    │                      ▼
//!    │                  Cancelling ──exit──▶ Completed { code, cancelled: true }
//!    └──spawn error──▶ Failed(reason)
//! ```
//!
//! Il processo figlio appartiene al worker: viene sempre atteso (reaped),
//! anche dopo una cancellazione o un errore di lettura. Nessun timeout:
//! `cancel()` e `kill()` sono l'unico modo per interrompere un ffmpeg bloccato.
//!
//! ## Esempio:
//! ```ignore
//! let mut supervisor = ProcessSupervisor::new(sink.clone());
//! let handle = supervisor.start(spec)?;
//! // ... più tardi, dal contesto di visualizzazione
//! handle.cancel();
//! let state = handle.wait().await;
//! ```

use crate::command::CommandSpec;
use crate::error::ConvertError;
use crate::log_sink::LogSink;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

/// Lifecycle of one external process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Starting,
    Running,
    Cancelling,
    Completed { code: i32, cancelled: bool },
    Failed { reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Map a terminal state to the conversion outcome.
    ///
    /// A non-zero exit is always surfaced with its exact code; a cancelled
    /// run that did not exit cleanly is reported as `CancelRequested`.
    pub fn to_result(&self) -> Result<(), ConvertError> {
        match self {
            Self::Completed { code: 0, .. } => Ok(()),
            Self::Completed {
                code,
                cancelled: true,
            } => Err(ConvertError::CancelRequested { code: *code }),
            Self::Completed { code, .. } => Err(ConvertError::ProcessorExitFailure(*code)),
            Self::Failed { reason } => Err(ConvertError::SpawnFailure(reason.clone())),
            Self::Starting | Self::Running | Self::Cancelling => Err(ConvertError::RunActive),
        }
    }
}

struct RunShared {
    state: watch::Sender<RunState>,
    terminate: Notify,
    kill: Notify,
    program: String,
    output: Option<PathBuf>,
}

/// Handle on one in-flight run. Clones observe the same run.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl RunHandle {
    /// Spawn `spec` and hand its stderr to a background task.
    ///
    /// Must be called from within a tokio runtime.
    fn spawn(spec: CommandSpec, sink: LogSink) -> Self {
        let (state, _) = watch::channel(RunState::Starting);
        let shared = Arc::new(RunShared {
            state,
            terminate: Notify::new(),
            kill: Notify::new(),
            program: spec.program.display().to_string(),
            output: spec.output.clone(),
        });

        debug!("Spawning: {}", spec);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => {
                info!("Started {} (pid {:?})", shared.program, child.id());
                shared.state.send_replace(RunState::Running);
                tokio::spawn(supervise(child, Arc::clone(&shared), sink));
            }
            Err(e) => {
                let reason = format!("{}: {}", shared.program, e);
                warn!("Failed to start {}", reason);
                sink.push(format!("Failed to start {}", reason));
                let failed = RunState::Failed { reason };
                shared.state.send_replace(failed.clone());
                sink.finish(failed);
            }
        }

        Self { shared }
    }

    pub fn state(&self) -> RunState {
        self.shared.state.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.shared.state.borrow().is_terminal()
    }

    /// File the command was asked to write
    pub fn output(&self) -> Option<&Path> {
        self.shared.output.as_deref()
    }

    pub fn program(&self) -> &str {
        &self.shared.program
    }

    /// Ask the owning worker to terminate the process.
    ///
    /// Only acts while Running; returns whether a request was issued.
    /// The run still drains output and reports the resulting exit code.
    pub fn cancel(&self) -> bool {
        let requested = self.shared.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Cancelling;
                true
            } else {
                false
            }
        });

        if requested {
            info!("Termination requested for {}", self.shared.program);
            self.shared.terminate.notify_one();
        }
        requested
    }

    /// Force the process down without waiting for it to honour `cancel()`.
    ///
    /// Acts while Running or Cancelling; the run is reported as cancelled.
    pub fn kill(&self) -> bool {
        let mut live = false;
        self.shared.state.send_if_modified(|state| match state {
            RunState::Running => {
                *state = RunState::Cancelling;
                live = true;
                true
            }
            RunState::Cancelling => {
                live = true;
                false
            }
            _ => false,
        });

        if live {
            warn!("Killing {}", self.shared.program);
            self.shared.kill.notify_one();
        }
        live
    }

    /// Wait until the run reaches a terminal state
    pub async fn wait(&self) -> RunState {
        let mut rx = self.shared.state.subscribe();
        let result = rx.wait_for(RunState::is_terminal).await.map(|s| s.clone());
        // The sender lives in `shared`, which we hold, so this cannot close.
        result.unwrap_or_else(|_| self.state())
    }
}

/// Owns the current run. At most one run is active at a time.
pub struct ProcessSupervisor {
    sink: LogSink,
    current: Option<RunHandle>,
}

impl ProcessSupervisor {
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            current: None,
        }
    }

    /// Start `spec`. Fails with `RunActive` if the previous run has not finished.
    pub fn start(&mut self, spec: CommandSpec) -> Result<RunHandle, ConvertError> {
        if self.is_busy() {
            return Err(ConvertError::RunActive);
        }

        let handle = RunHandle::spawn(spec, self.sink.clone());
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Request termination of the current run, if it is Running
    pub fn cancel(&self) -> bool {
        self.current.as_ref().is_some_and(RunHandle::cancel)
    }

    /// Force the current run down, if it is still live
    pub fn kill(&self) -> bool {
        self.current.as_ref().is_some_and(RunHandle::kill)
    }

    pub fn current(&self) -> Option<&RunHandle> {
        self.current.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_terminal())
    }
}

/// Termination requests already forwarded to the child
#[derive(Default)]
struct Sent {
    terminate: bool,
    kill: bool,
}

/// Worker: pump stderr into the sink, reap the child, publish the terminal state
async fn supervise(mut child: Child, shared: Arc<RunShared>, sink: LogSink) {
    let mut sent = Sent::default();

    if let Some(stderr) = child.stderr.take() {
        pump_lines(stderr, &mut child, &shared, &sink, &mut sent).await;
    }

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = shared.terminate.notified(), if !sent.terminate => {
                sent.terminate = true;
                request_termination(&mut child, &shared.program);
            }
            _ = shared.kill.notified(), if !sent.kill => {
                sent.kill = true;
                force_kill(&mut child, &shared.program);
            }
        }
    };

    let terminal = match status {
        Ok(status) => {
            let code = exit_code(status);
            let cancelled = *shared.state.borrow() == RunState::Cancelling;
            info!("{} exited with code {} (cancelled: {})", shared.program, code, cancelled);
            RunState::Completed { code, cancelled }
        }
        Err(e) => {
            warn!("Failed to wait for {}: {}", shared.program, e);
            sink.push(format!("Failed to wait for {}: {}", shared.program, e));
            RunState::Failed {
                reason: e.to_string(),
            }
        }
    };

    shared.state.send_replace(terminal.clone());
    sink.finish(terminal);
}

async fn pump_lines<R>(
    mut stream: R,
    child: &mut Child,
    shared: &RunShared,
    sink: &LogSink,
    sent: &mut Sent,
) where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.feed(&buf[..n]) {
                        sink.push(line);
                    }
                }
                Err(e) => {
                    warn!("Error reading {} output: {}", shared.program, e);
                    sink.push(format!("Error reading {} output: {}", shared.program, e));
                    break;
                }
            },
            _ = shared.terminate.notified(), if !sent.terminate => {
                sent.terminate = true;
                request_termination(child, &shared.program);
            }
            _ = shared.kill.notified(), if !sent.kill => {
                sent.kill = true;
                force_kill(child, &shared.program);
            }
        }
    }

    if let Some(rest) = splitter.finish() {
        sink.push(rest);
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child, program: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // `id()` is None once the child has been reaped; nothing to signal then.
    let Some(pid) = child.id() else { return };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to terminate {}: {}", program, e);
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, program: &str) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to terminate {}: {}", program, e);
    }
}

fn force_kill(child: &mut Child, program: &str) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill {}: {}", program, e);
    }
}

/// Exit code, or `-signal` for a process killed by a signal on Unix
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Splits a byte stream into lines on `\n`, `\r\n` and bare `\r`.
///
/// ffmpeg redraws its progress line with `\r`, so each redraw becomes a line.
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
    last_was_cr: bool,
}

impl LineSplitter {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' if self.last_was_cr => self.last_was_cr = false,
                b'\n' | b'\r' => {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                    self.last_was_cr = byte == b'\r';
                }
                _ => {
                    self.pending.push(byte);
                    self.last_was_cr = false;
                }
            }
        }
        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}
