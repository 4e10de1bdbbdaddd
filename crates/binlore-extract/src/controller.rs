//! The extraction controller proper: wires rule
//! matching, carving, command execution, symlink sanitization, the
//! matryoshka queue, and MD5-gated cleanup together behind `ExtractionSink`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use binlore_common::{Error, ExtractionSink, ScanResult};

use crate::carve;
use crate::exec;
use crate::privdrop;
use crate::rules::ExtractRule;
use crate::symlink;

/// Knobs the CLI layer threads through: output directory layout, carve
/// size/count limits, privilege drop.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub rules: Vec<ExtractRule>,
    pub base_dir: PathBuf,
    pub subdirs: bool,
    pub matryoshka_depth: Option<u32>,
    pub max_size: Option<u64>,
    pub max_count: Option<u64>,
    pub swap: u64,
    pub run_as_uid: Option<u32>,
    pub run_as_gid: Option<u32>,
    pub sanitize_symlinks: bool,
    pub remove_after_execute: bool,
}

/// One extraction controller lives for the duration of a single target
/// file's scan; `carved` and `count` only need to track that one file.
pub struct ExtractionController {
    config: ExtractionConfig,
    source_path: PathBuf,
    output_dir: PathBuf,
    carved: HashMap<u64, PathBuf>,
    count: u64,
}

fn build_output_directory(config: &ExtractionConfig, source_path: &Path) -> Result<PathBuf, Error> {
    let basename = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    let dir_name = format!("_{basename}.extracted");

    let mut candidate = config.base_dir.join(&dir_name);
    let mut n = 1;
    while candidate.exists() {
        candidate = config.base_dir.join(format!("{dir_name}-{n}"));
        n += 1;
    }
    std::fs::create_dir_all(&candidate)?;
    chown_to_run_as(&candidate, config.run_as_uid, config.run_as_gid);
    Ok(candidate)
}

#[cfg(unix)]
fn chown_to_run_as(dir: &Path, uid: Option<u32>, gid: Option<u32>) {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let (Some(uid), Some(gid)) = (uid, gid) else {
        return;
    };
    let Ok(cpath) = CString::new(dir.as_os_str().as_bytes()) else {
        return;
    };
    // SAFETY: `cpath` is a valid NUL-terminated path; failure is non-fatal
    // (best-effort ownership handoff to the run-as user).
    unsafe {
        libc::chown(cpath.as_ptr(), uid, gid);
    }
}

#[cfg(not(unix))]
fn chown_to_run_as(_dir: &Path, _uid: Option<u32>, _gid: Option<u32>) {}

fn depth_of(base: &Path, path: &Path) -> usize {
    path.strip_prefix(base)
        .map(|rel| rel.components().count())
        .unwrap_or(usize::MAX)
}

impl ExtractionController {
    /// # Errors
    /// Returns `Error::Module` if running as root without a configured
    /// run-as user, or `Error::Io` if the output directory can't be created.
    pub fn new(config: ExtractionConfig, source_path: &Path) -> Result<Self, Error> {
        privdrop::refuse_unconfigured_root(config.run_as_uid)?;
        let output_dir = build_output_directory(&config, source_path)?;
        Ok(Self {
            config,
            source_path: source_path.to_path_buf(),
            output_dir,
            carved: HashMap::new(),
            count: 0,
        })
    }

    fn matching_rules(&self, description: &str) -> Vec<ExtractRule> {
        self.config
            .rules
            .iter()
            .filter(|r| r.regex.is_match(description))
            .cloned()
            .collect()
    }

    /// Try each matching rule's `cmd` in turn until one succeeds; if none
    /// do, the last rule's output is left in place.
    fn run_rules(&self, rules: &[ExtractRule], carved_path: &Path) -> Result<Vec<PathBuf>, Error> {
        let carve_dir = carved_path.parent().unwrap_or_else(|| Path::new("."));
        let mut new_files = Vec::new();

        for (i, rule) in rules.iter().enumerate() {
            let before = carve::snapshot_dir(carve_dir).unwrap_or_default();
            let pre_md5 = carve::file_md5(carved_path).ok();

            let success = match &rule.cmd {
                None => true,
                Some(cmd) => exec::execute(
                    cmd,
                    carved_path,
                    rule.codes.as_deref(),
                    self.config.run_as_uid,
                    self.config.run_as_gid,
                )
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, rule = %rule.extension, "external extractor failed");
                    false
                }),
            };

            let after = carve::snapshot_dir(carve_dir).unwrap_or_default();
            new_files = after.into_iter().filter(|p| !before.contains(p)).collect();

            if self.config.remove_after_execute {
                if let Some(pre) = pre_md5 {
                    if carve::file_md5(carved_path).ok() == Some(pre) {
                        let _ = std::fs::remove_file(carved_path);
                    }
                }
            }

            if success || i == rules.len() - 1 {
                break;
            }
        }
        Ok(new_files)
    }

    fn enqueue_matryoshka(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let Some(depth) = self.config.matryoshka_depth else {
            return Vec::new();
        };
        let mut queue = Vec::new();
        for path in files {
            if depth_of(&self.config.base_dir, path) as u32 > depth {
                continue;
            }
            if path.is_dir() {
                if let Ok(entries) = walk_files(path) {
                    queue.extend(entries);
                }
            } else if std::fs::File::open(path).is_ok() {
                queue.push(path.clone());
            }
        }
        queue
    }
}

fn walk_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk_files(&path)?);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

impl ExtractionSink for ExtractionController {
    fn handle(&mut self, result: &ScanResult) -> Result<Vec<PathBuf>, Error> {
        if !(result.valid && result.display && result.extract) {
            return Ok(Vec::new());
        }
        let rules = self.matching_rules(&result.description);
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(max_count) = self.config.max_count {
            if self.count >= max_count {
                return Ok(Vec::new());
            }
        }

        let carve_dir = if self.config.subdirs {
            let sub = self.output_dir.join(format!("0x{:08X}", result.offset));
            std::fs::create_dir_all(&sub)?;
            sub
        } else {
            self.output_dir.clone()
        };

        let carved_path = carve::carve(
            &self.source_path,
            result.offset,
            result.size,
            self.config.swap,
            self.config.max_size,
            &rules[0].extension,
            &carve_dir,
            None,
        )?;
        self.carved.insert(result.offset, carved_path.clone());
        self.count += 1;

        let mut new_files = self.run_rules(&rules, &carved_path)?;
        new_files.push(carved_path.clone());

        if self.config.sanitize_symlinks {
            symlink::sanitize(&new_files, &self.output_dir);
        }

        Ok(self.enqueue_matryoshka(&new_files))
    }
}
