//! Stored Result Model

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One persisted analysis outcome, keyed by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Absolute (canonicalized) path of the analyzed file
    pub path: PathBuf,
    /// Wall-clock completion time
    pub timestamp: DateTime<Local>,
    /// Raw text printed by `<tool> report`
    pub report: String,
}

impl StoredResult {
    pub fn new(path: impl Into<PathBuf>, timestamp: DateTime<Local>, report: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timestamp,
            report: report.into(),
        }
    }

    /// Completion time as shown next to the report, e.g. "05 Dec 2014 14:03"
    pub fn date_label(&self) -> String {
        self.timestamp.format("%d %b %Y %H:%M").to_string()
    }
}
