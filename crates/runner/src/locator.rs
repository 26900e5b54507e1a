//! Tool Discovery
//!
//! Locates the coverage executable on PATH and probes its version.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Where users are pointed when the tool is missing
pub const COVERAGE_INSTALL_URL: &str = "https://pypi.python.org/pypi/coverage";

/// A located analysis executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Executable name as looked up (e.g. "coverage")
    pub name: String,
    /// Resolved path to the executable
    pub path: PathBuf,
    /// Version reported by `--version`, if it could be parsed
    pub version: Option<String>,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Compare the probed version against a dotted minimum such as "0.25".
    ///
    /// An unknown version is treated as satisfying the requirement; the tool
    /// was found, and refusing to run over an unparsable banner helps nobody.
    pub fn satisfies_minimum(&self, minimum: &str) -> bool {
        match &self.version {
            Some(version) => numeric_parts(version) >= numeric_parts(minimum),
            None => true,
        }
    }
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Extract the version token from `coverage --version` output.
///
/// The banner looks like `Coverage.py, version 7.4.0 with C extension` (older
/// releases end the token with a period). The version is the third
/// whitespace-separated word with trailing punctuation removed.
pub fn parse_version_output(output: &str) -> Option<String> {
    let token = output.split_whitespace().nth(2)?;
    let version = token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// Message telling the user how to make the tool available.
pub fn install_hint(tool_name: &str) -> String {
    #[cfg(windows)]
    {
        format!(
            "{} script was not found. Please add your Python \"Scripts\" directory to PATH, or install it: {}",
            tool_name, COVERAGE_INSTALL_URL
        )
    }

    #[cfg(not(windows))]
    {
        format!("Please install {}: {}", tool_name, COVERAGE_INSTALL_URL)
    }
}

/// Locates tools on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolLocator;

impl ToolLocator {
    pub fn new() -> Self {
        Self
    }

    /// Find the tool and probe its version. `None` if it is not on PATH.
    pub async fn discover(&self, name: &str) -> Option<ToolInfo> {
        let path = self.locate(name).await?;
        let info = ToolInfo::new(name, &path);
        match self.probe_version(&path).await {
            Some(version) => {
                tracing::info!("[ToolLocator] Found {} {} at {}", name, version, path.display());
                Some(info.with_version(version))
            }
            None => {
                tracing::info!("[ToolLocator] Found {} at {} (version unknown)", name, path.display());
                Some(info)
            }
        }
    }

    /// Resolve an executable name to a path using the platform lookup command.
    pub async fn locate(&self, name: &str) -> Option<PathBuf> {
        #[cfg(windows)]
        let lookup = "where";
        #[cfg(not(windows))]
        let lookup = "which";

        let output = Command::new(lookup)
            .arg(name)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            tracing::debug!("[ToolLocator] {} not found on PATH", name);
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
    }

    /// Run `<path> --version` and parse the reported version.
    pub async fn probe_version(&self, path: &Path) -> Option<String> {
        let mut cmd = Command::new(path);
        cmd.arg("--version").stdin(Stdio::null());
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.ok()?;
        parse_version_output(&String::from_utf8_lossy(&output.stdout))
    }
}
