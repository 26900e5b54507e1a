//! Analysis Failure Taxonomy
//!
//! Every failure that can happen during an analysis is converted into one of
//! these kinds at the session boundary before it reaches the host.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::Phase;

/// Failure kinds surfaced to the host.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisFailure {
    /// The coverage executable was never located; analyses are disabled
    #[error("Coverage tool unavailable: {hint}")]
    ToolUnavailable { hint: String },

    /// A phase process failed to launch
    #[error("Failed to start {phase} phase: {message}")]
    Spawn { phase: Phase, message: String },

    /// The report phase finished without producing a report
    #[error("Coverage produced no report: {diagnostic}")]
    RuntimeFailure { diagnostic: String },

    /// A phase exceeded the configured timeout and was killed
    #[error("{phase} phase timed out after {secs} seconds")]
    Timeout { phase: Phase, secs: u64 },

    /// The result was computed but could not be written to disk
    #[error("Failed to persist coverage results: {message}")]
    Persistence { message: String },
}

impl AnalysisFailure {
    /// Text suitable for an error dialog.
    ///
    /// For `RuntimeFailure` this is the raw diagnostic (possibly empty), which
    /// is what the tool printed on stderr.
    pub fn display_message(&self) -> String {
        match self {
            AnalysisFailure::RuntimeFailure { diagnostic } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}
