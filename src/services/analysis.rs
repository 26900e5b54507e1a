//! Analysis Session
//!
//! Turns "analyze this file" into a stored, displayable coverage report.
//!
//! A run is two sequential subprocess phases in the target's directory:
//! 1. EXECUTE - `<tool> run <file>`; output is discarded, only the exit matters
//! 2. REPORT - `<tool> report`; stdout is the report, stderr the diagnostic
//!
//! At most one run exists at a time. Starting a new analysis, or calling
//! `stop`, cancels the active run: its process is killed and reaped and its
//! partial output is dropped without touching the result store.
//!
//! Each run is a spawned task that owns its process handle, so a completion
//! from a cancelled run can never reach the state of the run that replaced it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use coverage_panel_core::{AnalysisEvent, AnalysisFailure, Phase};
use coverage_panel_runner::{
    install_hint, CommandSpec, ExitOutcome, PhaseOutput, ProcessRunner, ToolInfo, ToolLocator,
    TokioProcessRunner,
};

use crate::models::result::StoredResult;
use crate::models::settings::AnalysisConfig;
use crate::services::targets::is_module_or_package;
use crate::storage::result_store::ResultStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{absolutize, results_path};

/// Oldest coverage release whose CLI matches the two-phase invocation
pub const MINIMUM_TOOL_VERSION: &str = "0.25";

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Run State
// ============================================================================

/// What the session is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running {
        path: PathBuf,
        phase: Phase,
        /// Process id of the live phase, once spawned
        pid: Option<u32>,
    },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            RunState::Running { phase, .. } => Some(*phase),
            RunState::Idle => None,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Outcome of a finished report phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Non-empty stdout; this is the report to store
    Success(String),
    /// Empty stdout; carries stderr (possibly empty) for display only
    Failure(String),
}

/// Classify the report phase's captured output.
pub fn classify(output: &PhaseOutput) -> Classification {
    if output.stdout.is_empty() {
        Classification::Failure(output.stderr.clone())
    } else {
        Classification::Success(output.stdout.clone())
    }
}

// ============================================================================
// Shared State
// ============================================================================

type TargetFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// State reachable from both the session and its run task.
struct SessionShared {
    runner: Arc<dyn ProcessRunner>,
    store: RwLock<ResultStore>,
    state: watch::Sender<RunState>,
    events: broadcast::Sender<AnalysisEvent>,
    last_output: RwLock<Option<String>>,
    phase_timeout: Option<Duration>,
}

impl SessionShared {
    fn emit(&self, event: AnalysisEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Publish a new run state, notifying the host when running flips.
    fn set_state(&self, next: RunState) {
        let was_running = self.state.borrow().is_running();
        let now_running = next.is_running();
        self.state.send_replace(next);
        if was_running != now_running {
            self.emit(AnalysisEvent::RunningStateChanged(now_running));
        }
    }

    fn fail(&self, failure: AnalysisFailure) {
        tracing::warn!("[AnalysisSession] {}", failure);
        self.set_state(RunState::Idle);
        self.emit(AnalysisEvent::Error(failure));
    }

    /// Classify the report output and commit a success to the store.
    async fn commit(
        &self,
        target: &Path,
        output: PhaseOutput,
        token: &CancellationToken,
    ) -> RunOutcome {
        if token.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        *self.last_output.write().await = Some(output.combined());

        match classify(&output) {
            Classification::Success(report) => {
                let persisted = {
                    let mut store = self.store.write().await;
                    if token.is_cancelled() {
                        return RunOutcome::Cancelled;
                    }
                    store.put(target, Local::now(), report)
                };

                tracing::info!("[AnalysisSession] Stored coverage report for {}", target.display());
                self.set_state(RunState::Idle);
                self.emit(AnalysisEvent::ResultReady {
                    path: target.to_path_buf(),
                });

                if let Err(e) = persisted {
                    self.emit(AnalysisEvent::Error(AnalysisFailure::Persistence {
                        message: e.to_string(),
                    }));
                }
            }
            Classification::Failure(diagnostic) => {
                self.fail(AnalysisFailure::RuntimeFailure { diagnostic });
            }
        }

        RunOutcome::Completed
    }
}

/// How a run task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    /// Committed a result or reported a failure
    Completed,
    /// Stopped by its cancellation token before committing
    Cancelled,
}

enum PhaseResult {
    Finished(PhaseOutput, ExitOutcome),
    Cancelled,
    Failed(AnalysisFailure),
}

/// The one in-flight run
struct ActiveRun {
    path: PathBuf,
    token: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

// ============================================================================
// Run Task
// ============================================================================

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Spawn one phase and drive it to exit, cancellation, or timeout.
async fn drive_phase(
    shared: &SessionShared,
    tool: &Path,
    phase: Phase,
    target: &Path,
    token: &CancellationToken,
) -> PhaseResult {
    let spec = CommandSpec::for_phase(tool, phase, target);
    tracing::debug!("[AnalysisSession] Starting {} phase: {}", phase, spec.display());

    let mut process = match shared.runner.start(&spec).await {
        Ok(process) => process,
        Err(e) => {
            return PhaseResult::Failed(AnalysisFailure::Spawn {
                phase,
                message: e.to_string(),
            })
        }
    };

    shared.set_state(RunState::Running {
        path: target.to_path_buf(),
        phase,
        pid: process.pid(),
    });
    shared.emit(AnalysisEvent::PhaseStarted {
        path: target.to_path_buf(),
        phase,
    });

    let ready = process.ready_signal();
    let deadline = shared.phase_timeout.map(|timeout| Instant::now() + timeout);
    let mut output = PhaseOutput::default();

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                tracing::info!("[AnalysisSession] Cancelling {} phase for {}", phase, target.display());
                process.kill().await;
                return PhaseResult::Cancelled;
            }
            _ = sleep_until_deadline(deadline) => {
                process.kill().await;
                let secs = shared.phase_timeout.map(|t| t.as_secs()).unwrap_or_default();
                return PhaseResult::Failed(AnalysisFailure::Timeout { phase, secs });
            }
            _ = ready.notified() => {
                output.append(process.read_incremental());
            }
            exit = process.wait_for_exit() => {
                output.append(process.read_incremental());
                return PhaseResult::Finished(output, exit);
            }
        }
    }
}

async fn run_analysis(
    shared: Arc<SessionShared>,
    tool: PathBuf,
    target: PathBuf,
    token: CancellationToken,
) -> RunOutcome {
    match drive_phase(&shared, &tool, Phase::Execute, &target, &token).await {
        PhaseResult::Finished(output, exit) => {
            // Report regardless of the exit code; a failing script still
            // leaves usable measurement data behind.
            tracing::debug!(
                "[AnalysisSession] Execute phase exited with {:?} ({} bytes of output discarded)",
                exit.code,
                output.stdout.len() + output.stderr.len()
            );
        }
        PhaseResult::Cancelled => return RunOutcome::Cancelled,
        PhaseResult::Failed(failure) => {
            shared.fail(failure);
            return RunOutcome::Completed;
        }
    }

    if token.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    let output = match drive_phase(&shared, &tool, Phase::Report, &target, &token).await {
        PhaseResult::Finished(output, exit) => {
            tracing::debug!("[AnalysisSession] Report phase exited with {:?}", exit.code);
            output
        }
        PhaseResult::Cancelled => return RunOutcome::Cancelled,
        PhaseResult::Failed(failure) => {
            shared.fail(failure);
            return RunOutcome::Completed;
        }
    };

    shared.commit(&target, output, &token).await
}

// ============================================================================
// Analysis Session
// ============================================================================

/// Single-flight coverage analysis over a persistent result history.
pub struct AnalysisSession {
    config: AnalysisConfig,
    tool: Option<ToolInfo>,
    shared: Arc<SessionShared>,
    active: Mutex<Option<ActiveRun>>,
    target_filter: TargetFilter,
}

impl AnalysisSession {
    /// Assemble a session from its collaborators.
    ///
    /// `tool` is `None` when the executable could not be located; the session
    /// is still usable for reading history but refuses to analyze.
    pub fn new(
        config: AnalysisConfig,
        tool: Option<ToolInfo>,
        store: ResultStore,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let shared = Arc::new(SessionShared {
            runner,
            store: RwLock::new(store),
            state,
            events,
            last_output: RwLock::new(None),
            phase_timeout: config.phase_timeout_secs.map(Duration::from_secs),
        });

        Self {
            config,
            tool,
            shared,
            active: Mutex::new(None),
            target_filter: Arc::new(is_module_or_package),
        }
    }

    /// Locate the tool, load the history from its well-known location, and
    /// drop stale entries.
    pub async fn bootstrap(config: AnalysisConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;

        let tool = ToolLocator::new().discover(&config.tool_name).await;
        match &tool {
            Some(info) if !info.satisfies_minimum(MINIMUM_TOOL_VERSION) => {
                tracing::warn!(
                    "[AnalysisSession] {} {} is older than the required {}",
                    info.name,
                    info.version.as_deref().unwrap_or("?"),
                    MINIMUM_TOOL_VERSION
                );
            }
            Some(_) => {}
            None => {
                tracing::warn!("[AnalysisSession] {}", install_hint(&config.tool_name));
            }
        }

        let store = ResultStore::load(results_path()?, config.max_entries);
        let runner = Arc::new(
            TokioProcessRunner::new().with_kill_grace(Duration::from_millis(config.kill_grace_ms)),
        );

        let session = Self::new(config, tool, store, runner);
        session.refresh().await;
        Ok(session)
    }

    /// Replace the "still analyzable" predicate used by `refresh`.
    pub fn with_target_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.target_filter = Arc::new(filter);
        self
    }

    /// Receive upstream notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.shared.events.subscribe()
    }

    /// Observe run state changes
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.shared.state.subscribe()
    }

    pub fn run_state(&self) -> RunState {
        self.shared.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.borrow().is_running()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn tool(&self) -> Option<&ToolInfo> {
        self.tool.as_ref()
    }

    pub fn tool_available(&self) -> bool {
        self.tool.is_some()
    }

    /// Why analyses are disabled, if they are
    pub fn unavailable_reason(&self) -> Option<AnalysisFailure> {
        if self.tool.is_some() {
            None
        } else {
            Some(self.tool_unavailable())
        }
    }

    fn tool_unavailable(&self) -> AnalysisFailure {
        AnalysisFailure::ToolUnavailable {
            hint: install_hint(&self.config.tool_name),
        }
    }

    /// Start analyzing `path`, cancelling whatever run is in flight.
    ///
    /// Returns once the previous run (if any) has been killed and the new run
    /// has been scheduled; completion arrives as `ResultReady` or `Error`.
    /// Without a located tool this does nothing and returns `ToolUnavailable`.
    pub async fn analyze(&self, path: impl AsRef<Path>) -> Result<(), AnalysisFailure> {
        let tool = match &self.tool {
            Some(tool) => tool.path.clone(),
            None => return Err(self.tool_unavailable()),
        };
        let target = absolutize(path.as_ref());

        let mut active = self.active.lock().await;
        self.cancel_active(&mut active).await;
        *self.shared.last_output.write().await = None;

        tracing::info!("[AnalysisSession] Analyzing {}", target.display());
        self.shared.set_state(RunState::Running {
            path: target.clone(),
            phase: Phase::Execute,
            pid: None,
        });

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_analysis(
            self.shared.clone(),
            tool,
            target.clone(),
            token.clone(),
        ));

        *active = Some(ActiveRun {
            path: target,
            token,
            handle,
        });
        Ok(())
    }

    /// Cancel the active run, if any. Returns whether a run was cancelled.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        let cancelled = self.cancel_active(&mut active).await;
        self.shared.set_state(RunState::Idle);
        cancelled
    }

    /// Signal the active run and wait until its task (and process) is gone.
    async fn cancel_active(&self, slot: &mut Option<ActiveRun>) -> bool {
        let Some(run) = slot.take() else {
            return false;
        };

        run.token.cancel();
        match run.handle.await {
            Ok(RunOutcome::Cancelled) => {
                tracing::info!("[AnalysisSession] Cancelled run for {}", run.path.display());
                self.shared
                    .emit(AnalysisEvent::Cancelled { path: run.path });
                true
            }
            Ok(RunOutcome::Completed) => false,
            Err(e) => {
                tracing::warn!("[AnalysisSession] Run task for {} failed: {}", run.path.display(), e);
                false
            }
        }
    }

    /// Wait until no run is active.
    pub async fn wait_idle(&self) {
        let mut state = self.shared.state.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here
        let _ = state.wait_for(|s| !s.is_running()).await;
    }

    /// Stored result for `path`; never triggers an analysis.
    pub async fn get_result(&self, path: impl AsRef<Path>) -> Option<StoredResult> {
        self.shared.store.read().await.get(path).cloned()
    }

    /// Record a report obtained outside the session.
    pub async fn set_result(
        &self,
        path: impl AsRef<Path>,
        report: impl Into<String>,
    ) -> Result<(), AnalysisFailure> {
        let key = absolutize(path.as_ref());
        let persisted = self
            .shared
            .store
            .write()
            .await
            .put(&key, Local::now(), report);

        self.shared.emit(AnalysisEvent::ResultReady { path: key });
        persisted.map_err(|e| AnalysisFailure::Persistence {
            message: e.to_string(),
        })
    }

    /// Analyzed paths, most recent first
    pub async fn list(&self) -> Vec<PathBuf> {
        self.shared.store.read().await.paths()
    }

    /// Drop history entries whose files are no longer analyzable.
    ///
    /// Returns how many entries were removed.
    pub async fn refresh(&self) -> usize {
        let filter = self.target_filter.clone();
        let mut store = self.shared.store.write().await;
        let before = store.len();

        if let Err(e) = store.prune(|path| filter(path)) {
            self.shared.emit(AnalysisEvent::Error(AnalysisFailure::Persistence {
                message: e.to_string(),
            }));
        }
        before - store.len()
    }

    /// stderr + stdout of the last finished report phase
    pub async fn last_output(&self) -> Option<String> {
        self.shared.last_output.read().await.clone()
    }

    /// Where the result history is persisted
    pub async fn data_path(&self) -> PathBuf {
        self.shared.store.read().await.data_path().to_path_buf()
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        // The run task kills its own process once it sees the token
        if let Ok(mut active) = self.active.try_lock() {
            if let Some(run) = active.take() {
                run.token.cancel();
            }
        }
    }
}
