//! ASCII cpio archive plugin, ported from `cpio.py`: marks only the first
//! entry of an archive `extract=true` and advances past each entry via
//! `jump`, so the scanner doesn't re-carve the same archive once per entry.

use std::path::PathBuf;
use std::sync::Mutex;

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;

use crate::extract_quoted_field;

/// CPIO new-ASCII header fields are 8 hex digits with no `0x` prefix, unlike
/// the `0x`/decimal ints `parse_int` handles elsewhere in this crate.
fn parse_hex_field(s: &str) -> Option<i64> {
    i64::from_str_radix(s.trim(), 16).ok()
}

/// CPIO new-ASCII header is 110 bytes; `jump` skips the header, the
/// filename (padded into the reported length), and the file's own data.
const CPIO_HEADER_SIZE: i64 = 110;

#[derive(Default)]
struct State {
    found_archive: bool,
    found_archive_in_file: Option<PathBuf>,
    consecutive_hits: u32,
}

/// Tracks archive state per scan; plugins are shared across threads so the
/// mutable bookkeeping lives behind a `Mutex` (hooks take `&self`).
#[derive(Default)]
pub struct CpioPlugin {
    state: Mutex<State>,
}

impl CpioPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = State::default();
    }
}

impl Plugin for CpioPlugin {
    fn name(&self) -> &str {
        "cpio"
    }

    fn pre_scan(&self) -> Result<(), Error> {
        self.reset();
        Ok(())
    }

    fn new_file(&self, _path: &std::path::Path) -> Result<(), Error> {
        self.reset();
        Ok(())
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.valid {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !result.description.starts_with("ASCII cpio archive") {
            if state.consecutive_hits < 4 {
                *state = State::default();
            } else {
                result.valid = false;
            }
            return Ok(());
        }

        let file_size = extract_quoted_field(&result.description, "file size: \"").and_then(|s| parse_hex_field(&s));
        let file_name = extract_quoted_field(&result.description, "file name: \"").unwrap_or_default();
        let file_name_length =
            extract_quoted_field(&result.description, "file name length: \"").and_then(|s| parse_hex_field(&s));

        // +1 for the terminating NUL byte.
        let lengths_agree = matches!(file_name_length, Some(n) if n == file_name.len() as i64 + 1);
        let (Some(size), true) = (file_size, lengths_agree) else {
            result.valid = false;
            return Ok(());
        };

        result.jump = CPIO_HEADER_SIZE + size + file_name_length.unwrap_or(0);
        state.consecutive_hits += 1;

        if !state.found_archive || state.found_archive_in_file.as_deref() != Some(result.file.as_path()) {
            state.found_archive_in_file = Some(result.file.clone());
            state.found_archive = true;
            result.extract = true;
        } else if result.description.contains("TRAILER!!!") {
            state.found_archive = false;
            result.extract = false;
            state.consecutive_hits = 0;
        } else {
            result.extract = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn entry(description: &str) -> ScanResult {
        ScanResult {
            offset: 0,
            size: 110,
            description: description.to_string(),
            id: 1,
            jump: 0,
            valid: true,
            display: true,
            extract: false,
            plot: false,
            overlap: false,
            once: false,
            many: false,
            end: false,
            adjust: 0,
            strlen: None,
            file: Path::new("firmware.cpio").to_path_buf(),
            module: "sig".to_string(),
        }
    }

    // CPIO new-ASCII header fields are 8 hex digits, e.g. "00000004" for 4.

    #[test]
    fn first_entry_is_marked_extractable() {
        let plugin = CpioPlugin::new();
        let mut result = entry(
            "ASCII cpio archive, file name length: \"00000004\", file size: \"0000000A\", file name: \"foo\"",
        );
        plugin.scan(&mut result).unwrap();
        assert!(result.valid);
        assert!(result.extract);
        assert_eq!(result.jump, CPIO_HEADER_SIZE + 0xA + 4);
    }

    #[test]
    fn subsequent_entry_in_same_archive_is_not_extracted() {
        let plugin = CpioPlugin::new();
        let mut first = entry(
            "ASCII cpio archive, file name length: \"00000004\", file size: \"0000000A\", file name: \"foo\"",
        );
        plugin.scan(&mut first).unwrap();

        let mut second = entry(
            "ASCII cpio archive, file name length: \"00000004\", file size: \"00000014\", file name: \"bar\"",
        );
        plugin.scan(&mut second).unwrap();
        assert!(!second.extract);
    }

    #[test]
    fn trailer_entry_resets_archive_state() {
        let plugin = CpioPlugin::new();
        let mut first = entry(
            "ASCII cpio archive, file name length: \"00000004\", file size: \"0000000A\", file name: \"foo\"",
        );
        plugin.scan(&mut first).unwrap();

        let mut trailer = entry(
            "ASCII cpio archive, file name length: \"0000000B\", file size: \"00000000\", file name: \"TRAILER!!!\"",
        );
        plugin.scan(&mut trailer).unwrap();
        assert!(!trailer.extract);
    }

    #[test]
    fn mismatched_name_length_marks_invalid() {
        let plugin = CpioPlugin::new();
        let mut result = entry(
            "ASCII cpio archive, file name length: \"00000063\", file size: \"0000000A\", file name: \"foo\"",
        );
        plugin.scan(&mut result).unwrap();
        assert!(!result.valid);
    }
}
