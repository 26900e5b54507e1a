//! Settings Models
//!
//! Analysis configuration stored in config.json.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_entries`
pub const MAX_ENTRIES_LIMIT: usize = 10_000;

/// Analysis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Result history capacity; the least recently analyzed file is evicted beyond it
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Hint for the host: save the current editor buffer before analyzing
    #[serde(default = "default_save_before")]
    pub save_before: bool,
    /// Executable name looked up on PATH
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
    /// Kill a phase that runs longer than this many seconds (no limit if unset)
    #[serde(default)]
    pub phase_timeout_secs: Option<u64>,
    /// How long to wait for the OS to reclaim a killed process, in milliseconds
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_max_entries() -> usize {
    50
}

fn default_save_before() -> bool {
    true
}

fn default_tool_name() -> String {
    "coverage".to_string()
}

fn default_kill_grace_ms() -> u64 {
    5_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            save_before: default_save_before(),
            tool_name: default_tool_name(),
            phase_timeout_secs: None,
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub max_entries: Option<usize>,
    pub save_before: Option<bool>,
    pub tool_name: Option<String>,
    /// `Some(None)` clears the timeout
    pub phase_timeout_secs: Option<Option<u64>>,
    pub kill_grace_ms: Option<u64>,
}

impl AnalysisConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(max_entries) = update.max_entries {
            self.max_entries = max_entries;
        }
        if let Some(save_before) = update.save_before {
            self.save_before = save_before;
        }
        if let Some(tool_name) = update.tool_name {
            self.tool_name = tool_name;
        }
        if let Some(timeout) = update.phase_timeout_secs {
            self.phase_timeout_secs = timeout;
        }
        if let Some(grace) = update.kill_grace_ms {
            self.kill_grace_ms = grace;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be at least 1".to_string());
        }
        if self.max_entries > MAX_ENTRIES_LIMIT {
            return Err(format!("max_entries cannot exceed {}", MAX_ENTRIES_LIMIT));
        }

        if self.tool_name.trim().is_empty() {
            return Err("tool_name cannot be empty".to_string());
        }

        if self.phase_timeout_secs == Some(0) {
            return Err("phase_timeout_secs must be positive when set".to_string());
        }

        Ok(())
    }
}
