//! Analyzable Targets
//!
//! Decides whether a path is still something coverage can be run against.
//! Used to prune history entries for files that were deleted or renamed.

use std::path::Path;

const MODULE_EXTENSIONS: &[&str] = &["py", "pyw"];

/// A Python source file, or a package directory with an `__init__.py`.
pub fn is_module_or_package(path: &Path) -> bool {
    if path.is_dir() {
        return path.join("__init__.py").is_file();
    }

    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| MODULE_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
}
