//! Shared test helpers
//!
//! `FakeRunner` stands in for the process layer. Each phase pops the next
//! scripted behavior from its own queue and every start, exit and kill is
//! recorded, so tests can assert ordering without real subprocesses.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use coverage_panel::{
    AnalysisConfig, AnalysisEvent, AnalysisSession, CommandSpec, CoreError, CoreResult,
    ExitOutcome, OutputChunk, Phase, ProcessRunner, ResultStore, RunningProcess, ToolInfo,
};

/// Scripted behavior of one fake process
#[derive(Debug, Clone)]
pub enum Script {
    /// Produce this output and exit with `code`
    Exit {
        stdout: String,
        stderr: String,
        code: i32,
    },
    /// Produce `stdout`, then never exit on its own
    Hang { stdout: String },
    /// Fail to launch
    SpawnError,
}

impl Script {
    pub fn ok(stdout: &str) -> Self {
        Script::Exit {
            stdout: stdout.to_string(),
            stderr: String::new(),
            code: 0,
        }
    }

    pub fn failing(stdout: &str, stderr: &str, code: i32) -> Self {
        Script::Exit {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            code,
        }
    }

    pub fn hang() -> Self {
        Script::Hang {
            stdout: String::new(),
        }
    }
}

/// One recorded interaction with the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start { phase: Phase, spec: CommandSpec },
    Exited { pid: u32 },
    Kill { pid: u32 },
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl Recorder {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn spawned(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
    }

    fn ended(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Process runner driven by per-phase script queues
#[derive(Default)]
pub struct FakeRunner {
    scripts: Mutex<HashMap<Phase, VecDeque<Script>>>,
    recorder: Arc<Recorder>,
    next_pid: AtomicU32,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the behavior of the next process started for `phase`
    pub fn script(&self, phase: Phase, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(phase)
            .or_default()
            .push_back(script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.recorder.calls.lock().unwrap().clone()
    }

    pub fn started_phases(&self) -> Vec<Phase> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start { phase, .. } => Some(phase),
                _ => None,
            })
            .collect()
    }

    pub fn kill_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Kill { .. }))
            .count()
    }

    /// Most processes that were ever alive at the same time
    pub fn max_live(&self) -> usize {
        self.recorder.max_live.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.recorder.live.load(Ordering::SeqCst)
    }
}

fn phase_of(spec: &CommandSpec) -> Phase {
    match spec.args.first().map(String::as_str) {
        Some("run") => Phase::Execute,
        _ => Phase::Report,
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn start(&self, spec: &CommandSpec) -> CoreResult<Box<dyn RunningProcess>> {
        let phase = phase_of(spec);
        self.recorder.push(Call::Start {
            phase,
            spec: spec.clone(),
        });

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&phase)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Script::ok(""));

        let (pending, exit) = match script {
            Script::SpawnError => {
                return Err(CoreError::not_found(format!(
                    "'{}' could not be launched",
                    spec.program.display()
                )))
            }
            Script::Exit {
                stdout,
                stderr,
                code,
            } => (OutputChunk { stdout, stderr }, Some(code)),
            Script::Hang { stdout } => (
                OutputChunk {
                    stdout,
                    stderr: String::new(),
                },
                None,
            ),
        };

        self.recorder.spawned();
        let ready = Arc::new(Notify::new());
        ready.notify_one();

        Ok(Box::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst) + 1000,
            ready,
            pending: Some(pending),
            exit_code: exit,
            finished: false,
            recorder: self.recorder.clone(),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    ready: Arc<Notify>,
    pending: Option<OutputChunk>,
    /// `None` hangs until killed
    exit_code: Option<i32>,
    finished: bool,
    recorder: Arc<Recorder>,
}

impl FakeProcess {
    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.recorder.ended();
        }
    }
}

#[async_trait]
impl RunningProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn ready_signal(&self) -> Arc<Notify> {
        self.ready.clone()
    }

    fn read_incremental(&mut self) -> OutputChunk {
        self.pending.take().unwrap_or_default()
    }

    async fn wait_for_exit(&mut self) -> ExitOutcome {
        match self.exit_code {
            Some(code) => {
                self.recorder.push(Call::Exited { pid: self.pid });
                self.finish();
                ExitOutcome::exited(Some(code))
            }
            None => std::future::pending().await,
        }
    }

    async fn kill(&mut self) {
        self.recorder.push(Call::Kill { pid: self.pid });
        self.finish();
    }
}

/// A file the default target filter accepts
pub fn python_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "print('hello')\n").unwrap();
    path.canonicalize().unwrap()
}

pub fn located_tool() -> ToolInfo {
    ToolInfo::new("coverage", "/usr/bin/coverage").with_version("7.4.0")
}

/// Session over `runner` persisting into `dir`
pub fn session_with(
    runner: Arc<FakeRunner>,
    dir: &Path,
    config: AnalysisConfig,
) -> AnalysisSession {
    let store = ResultStore::new(dir.join("coverage.results.json"), config.max_entries);
    AnalysisSession::new(config, Some(located_tool()), store, runner)
}

pub async fn next_event(events: &mut broadcast::Receiver<AnalysisEvent>) -> AnalysisEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Collect events up to and including the first one matching `done`.
pub async fn events_until<F>(
    events: &mut broadcast::Receiver<AnalysisEvent>,
    done: F,
) -> Vec<AnalysisEvent>
where
    F: Fn(&AnalysisEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let finished = done(&event);
        seen.push(event);
        if finished {
            return seen;
        }
    }
}
