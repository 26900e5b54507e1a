//! Analysis Events
//!
//! Notifications the analysis session sends to its host. The host (a dock
//! widget, a status bar, a test) only ever observes these; it never reaches
//! into the session's run state directly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::failure::AnalysisFailure;

/// One of the two subprocess invocations that make up an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// `<tool> run <file>`: executes the target under measurement
    Execute,
    /// `<tool> report`: renders the measurement left by `Execute`
    Report,
}

impl Phase {
    /// Subcommand passed to the coverage tool for this phase.
    pub fn subcommand(&self) -> &'static str {
        match self {
            Phase::Execute => "run",
            Phase::Report => "report",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Execute => write!(f, "execute"),
            Phase::Report => write!(f, "report"),
        }
    }
}

/// Event emitted by the analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// A run started or finished; drives start/stop affordances
    RunningStateChanged(bool),
    /// A phase process was spawned for `path`
    PhaseStarted { path: PathBuf, phase: Phase },
    /// A fresh result for `path` is readable through the session
    ResultReady { path: PathBuf },
    /// The run for `path` was cancelled before it could commit
    Cancelled { path: PathBuf },
    /// A run failed, or its result could not be persisted
    Error(AnalysisFailure),
}

impl AnalysisEvent {
    /// Whether this event carries a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisEvent::Error(_))
    }
}
