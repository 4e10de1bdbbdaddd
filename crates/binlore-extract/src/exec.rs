//! Running a rule's `cmd` against a carved file (ported
//! from `extractor.py`'s `execute`).

use std::path::{Path, PathBuf};

use binlore_common::Error;

use crate::privdrop;

const FILE_NAME_PLACEHOLDER: &str = "%e";
const UNIQUE_PATH_DELIMITER: &str = "%%";

/// A path guaranteed not to already exist in `dir`, for `%%name%%`
/// placeholders that need a fresh scratch path (e.g. an unsquashfs output
/// directory).
fn unique_path(dir: &Path, base: &str) -> PathBuf {
    let plain = dir.join(base);
    if !plain.exists() {
        return plain;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{base}-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn substitute_unique_paths(cmd: &str, dir: &Path) -> String {
    let mut out = cmd.to_string();
    loop {
        let Some(start) = out.find(UNIQUE_PATH_DELIMITER) else {
            break;
        };
        let after = start + UNIQUE_PATH_DELIMITER.len();
        let Some(rel_end) = out[after..].find(UNIQUE_PATH_DELIMITER) else {
            break;
        };
        let name = &out[after..after + rel_end];
        let replacement = unique_path(dir, name).display().to_string();
        let end = after + rel_end + UNIQUE_PATH_DELIMITER.len();
        out.replace_range(start..end, &replacement);
    }
    out
}

/// A sub-command ending in `< %e` has the carved file piped to its stdin
/// instead of appended to its argv — the shell-redirection spelling of the
/// source's in-process callables that pipe a carved file into a subprocess
/// (e.g. the `cpio` extractor's `subprocess.call(..., stdin=fpin)`).
const STDIN_REDIRECT_SUFFIX: &str = "< %e";

/// Run `cmd_template` against `carved`, sub-command by sub-command (split on
/// `&&`), substituting `%e` and `%%name%%` placeholders. Returns whether the
/// last sub-command's exit code was in `codes` (an empty/`None` list means
/// any code counts as success).
pub fn execute(
    cmd_template: &str,
    carved: &Path,
    codes: Option<&[i32]>,
    run_as_uid: Option<u32>,
    run_as_gid: Option<u32>,
) -> Result<bool, Error> {
    let dir = carved.parent().unwrap_or_else(|| Path::new("."));
    let expanded = substitute_unique_paths(cmd_template, dir);
    let carved_display = carved.display().to_string();

    let mut success = true;
    for sub in expanded.split("&&") {
        let sub = sub.trim();
        let (sub, stdin_file) = match sub.strip_suffix(STDIN_REDIRECT_SUFFIX) {
            Some(rest) => (rest.trim(), Some(carved)),
            None => (sub, None),
        };
        let sub = sub.replace(FILE_NAME_PLACEHOLDER, &carved_display);
        tracing::debug!(command = %sub, "running external extractor");
        let argv = shlex::split(&sub)
            .ok_or_else(|| Error::Subprocess(format!("unbalanced quoting in `{sub}`")))?;
        let code = privdrop::run_with_stdin(&argv, stdin_file, run_as_uid, run_as_gid)?;
        success = match codes {
            Some(list) => list.contains(&code),
            None => true,
        };
        tracing::debug!(command = %sub, code, success, "external extractor finished");
        if !success {
            break;
        }
    }
    Ok(success)
}
