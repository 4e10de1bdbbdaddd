//! On-disk configuration (`config.toml`), loaded from the user config
//! directory and overridden field-by-field by CLI flags. Mirrors the
//! teacher's layered config approach, scaled down to this CLI's knobs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BinloreConfig {
    pub block_size: Option<usize>,
    pub peek_size: Option<usize>,
    pub swap: Option<usize>,
    pub extract: Option<ExtractConfigToml>,
    pub run_as: Option<RunAsToml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExtractConfigToml {
    pub enabled: Option<bool>,
    pub rules_file: Option<PathBuf>,
    pub subdirs: Option<bool>,
    pub matryoshka_depth: Option<u32>,
    pub max_size: Option<u64>,
    pub max_count: Option<u64>,
    pub sanitize_symlinks: Option<bool>,
    pub remove_after_execute: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RunAsToml {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl BinloreConfig {
    /// Loads `config.toml` from `path` if it exists; an absent file is not
    /// an error, it just means every knob falls back to CLI defaults.
    ///
    /// # Errors
    /// Returns `Error::Module` if the file exists but fails to parse.
    pub fn load(path: &Path) -> Result<Self, binlore_common::Error> {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Ok(Self::default());
        };
        toml::from_str(&text).map_err(|e| binlore_common::Error::Module(format!("config.toml: {e}")))
    }
}
