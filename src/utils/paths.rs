//! Cross-Platform Path Utilities
//!
//! Functions for resolving the library's directories across platforms
//! (~/.coverage-panel/) and for normalizing analysis targets.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Coverage Panel directory (~/.coverage-panel/)
pub fn app_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".coverage-panel"))
}

/// Get the config file path (~/.coverage-panel/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

/// Get the result history path (~/.coverage-panel/coverage.results.json)
pub fn results_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("coverage.results.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Coverage Panel directory, creating if it doesn't exist
pub fn ensure_app_dir() -> AppResult<PathBuf> {
    let path = app_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

/// Resolve a target to the absolute form used as a result key.
///
/// Existing paths are canonicalized. Paths that do not exist (deleted files,
/// test fixtures) are made absolute against the current directory without
/// touching the filesystem further.
pub fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
