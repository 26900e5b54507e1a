//! Process Runner
//!
//! Spawns one external command, captures stdout and stderr as two independent
//! streams, and reports completion. Reader tasks push bytes into a shared
//! buffer and signal a `Notify`; the owner drains on that signal instead of
//! polling on a timer.

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use coverage_panel_core::{CoreError, CoreResult};

use crate::decode::StreamDecoder;
use crate::models::{CommandSpec, ExitOutcome, OutputChunk, StreamKind};

/// Default bounded wait for the OS to reclaim a killed process
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long capture continues once the process itself has exited
pub const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Starts processes.
///
/// The session depends on this trait rather than on tokio directly so tests
/// can substitute a runner that records invocations.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn `spec` with stdout and stderr captured.
    ///
    /// Fails immediately with `CoreError::Command` / `CoreError::NotFound`
    /// if the program cannot be launched.
    async fn start(&self, spec: &CommandSpec) -> CoreResult<Box<dyn RunningProcess>>;
}

/// Handle to one live (or finished) process.
#[async_trait]
pub trait RunningProcess: Send {
    /// OS process id, if known
    fn pid(&self) -> Option<u32>;

    /// Signalled whenever new output (or end-of-stream) is available.
    fn ready_signal(&self) -> Arc<Notify>;

    /// Non-blocking drain of whatever text arrived since the last call.
    fn read_incremental(&mut self) -> OutputChunk;

    /// Resolve when the process terminates naturally.
    ///
    /// Once this returns, the output written before exit is available through
    /// `read_incremental`; capture stops after a short drain window even if a
    /// background child still holds the pipes. Cancel-safe: dropping the future before it resolves
    /// leaves the handle usable.
    async fn wait_for_exit(&mut self) -> ExitOutcome;

    /// Forcibly terminate the process, then wait (bounded) for it to be
    /// reaped. Idempotent once the process has exited.
    async fn kill(&mut self);
}

/// Shared capture buffers written by the reader tasks.
#[derive(Debug, Default)]
struct CapturedStreams {
    stdout: StreamDecoder,
    stderr: StreamDecoder,
}

impl CapturedStreams {
    fn stream_mut(&mut self, kind: StreamKind) -> &mut StreamDecoder {
        match kind {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        }
    }
}

fn lock_streams(streams: &Mutex<CapturedStreams>) -> MutexGuard<'_, CapturedStreams> {
    // A reader task can only poison the lock by panicking mid-push; the
    // buffers are still consistent enough to read.
    streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process runner backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    kill_grace: Duration,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self {
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Set how long `kill` waits for the OS to reclaim the process
    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    /// Spawn and return the concrete handle.
    pub fn spawn(&self, spec: &CommandSpec) -> CoreResult<TokioProcess> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::not_found(format!(
                    "'{}' could not be launched: {}",
                    spec.program.display(),
                    e
                ))
            } else {
                CoreError::command(format!("Failed to spawn '{}': {}", spec.display(), e))
            }
        })?;

        let pid = child.id();
        tracing::debug!("[ProcessRunner] Spawned pid {:?}: {}", pid, spec.display());

        let streams = Arc::new(Mutex::new(CapturedStreams::default()));
        let ready = Arc::new(Notify::new());
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                StreamKind::Stdout,
                streams.clone(),
                ready.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                StreamKind::Stderr,
                streams.clone(),
                ready.clone(),
            ));
        }

        Ok(TokioProcess {
            child,
            pid,
            streams,
            ready,
            readers,
            exit: None,
            kill_grace: self.kill_grace,
        })
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn start(&self, spec: &CommandSpec) -> CoreResult<Box<dyn RunningProcess>> {
        let process = self.spawn(spec)?;
        Ok(Box::new(process))
    }
}

/// Copy one pipe into the shared buffer until EOF.
///
/// Read errors end the stream like EOF does; partial capture is acceptable.
fn spawn_reader<R>(
    mut pipe: R,
    kind: StreamKind,
    streams: Arc<Mutex<CapturedStreams>>,
    ready: Arc<Notify>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    lock_streams(&streams).stream_mut(kind).push(&buf[..n]);
                    ready.notify_one();
                }
                Err(e) => {
                    tracing::debug!("[ProcessRunner] {:?} read failed, closing: {}", kind, e);
                    break;
                }
            }
        }
        lock_streams(&streams).stream_mut(kind).finish();
        ready.notify_one();
    })
}

/// Handle to a process spawned by `TokioProcessRunner`
pub struct TokioProcess {
    child: Child,
    pid: Option<u32>,
    streams: Arc<Mutex<CapturedStreams>>,
    ready: Arc<Notify>,
    readers: Vec<JoinHandle<()>>,
    exit: Option<ExitOutcome>,
    kill_grace: Duration,
}

impl TokioProcess {
    /// Wait for the reader tasks to hit EOF.
    ///
    /// Handles are popped only after they complete, so cancelling this
    /// midway never polls a finished `JoinHandle` again.
    async fn join_readers(&mut self) {
        while let Some(handle) = self.readers.last_mut() {
            if let Err(e) = handle.await {
                tracing::debug!("[ProcessRunner] Reader task ended abnormally: {}", e);
            }
            self.readers.pop();
        }
    }

    /// Stop reading and flush whatever the decoders still hold back.
    fn close_capture(&mut self) {
        for handle in self.readers.drain(..) {
            handle.abort();
        }

        let mut guard = lock_streams(&self.streams);
        let streams = &mut *guard;
        for decoder in [&mut streams.stdout, &mut streams.stderr] {
            if !decoder.is_closed() {
                decoder.finish();
            }
        }
    }
}

#[async_trait]
impl RunningProcess for TokioProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn ready_signal(&self) -> Arc<Notify> {
        self.ready.clone()
    }

    fn read_incremental(&mut self) -> OutputChunk {
        let mut streams = lock_streams(&self.streams);
        OutputChunk {
            stdout: streams.stdout.take_text(),
            stderr: streams.stderr.take_text(),
        }
    }

    async fn wait_for_exit(&mut self) -> ExitOutcome {
        if self.exit.is_none() {
            let outcome = match self.child.wait().await {
                Ok(status) => ExitOutcome::exited(status.code()),
                Err(e) => {
                    tracing::warn!("[ProcessRunner] Failed to wait for pid {:?}: {}", self.pid, e);
                    ExitOutcome::exited(None)
                }
            };
            self.exit = Some(outcome);
        }

        // A background child that inherited the pipes keeps them open past
        // our exit, so EOF is only awaited for a bounded window.
        if tokio::time::timeout(EXIT_DRAIN_GRACE, self.join_readers())
            .await
            .is_err()
        {
            tracing::debug!(
                "[ProcessRunner] pid {:?} exited with its pipes still open; closing capture",
                self.pid
            );
            self.close_capture();
        }

        self.exit.unwrap_or(ExitOutcome::exited(None))
    }

    async fn kill(&mut self) {
        if self.exit.is_some() {
            self.close_capture();
            return;
        }

        if let Err(e) = self.child.start_kill() {
            tracing::debug!("[ProcessRunner] start_kill on pid {:?}: {}", self.pid, e);
        }

        match tokio::time::timeout(self.kill_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("[ProcessRunner] Killed pid {:?} ({})", self.pid, status);
                self.exit = Some(ExitOutcome::killed(status.code()));
            }
            Ok(Err(e)) => {
                tracing::warn!("[ProcessRunner] Failed to reap pid {:?}: {}", self.pid, e);
                self.exit = Some(ExitOutcome::killed(None));
            }
            Err(_) => {
                tracing::warn!(
                    "[ProcessRunner] pid {:?} did not exit within {:?} of kill",
                    self.pid,
                    self.kill_grace
                );
            }
        }

        self.close_capture();
    }
}

impl Drop for TokioProcess {
    fn drop(&mut self) {
        // Prevent zombies if the owner never called kill/wait
        if self.exit.is_none() {
            let _ = self.child.start_kill();
        }
        for handle in self.readers.drain(..) {
            handle.abort();
        }
    }
}
