//! Centralized binlore user-directory resolution.
//!
//! Priority for the user-level base directory:
//!   1. `BINLORE_HOME` env var (if set and non-empty)
//!   2. `dirs::config_dir().map(|d| d.join("binlore"))` (platform default)

use std::path::PathBuf;

fn resolve_user_path(dirs_fallback: Option<PathBuf>) -> Option<PathBuf> {
    if let Ok(home) = std::env::var("BINLORE_HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    dirs_fallback
}

/// Base directory for user-provided signatures, `extract.conf`, and
/// `config.toml`.
pub fn user_dir() -> Option<PathBuf> {
    resolve_user_path(dirs::config_dir().map(|d| d.join("binlore")))
}

/// Directory plugins are loaded from ("two directories: user,
/// system"); binlore only has the user directory since plugins here are
/// compiled in, but user signature/extract-conf overrides still live here.
pub fn user_signatures_dir() -> Option<PathBuf> {
    user_dir().map(|d| d.join("signatures"))
}
