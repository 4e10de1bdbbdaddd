//! UBI erase-count header validation, ported from `ubivalid.py`: checks the
//! header CRC and derives the physical erase block size from the spacing
//! between consecutive headers, then uses it to `jump` past each block.

use std::path::PathBuf;
use std::sync::Mutex;

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;

const HEADER_LEN: usize = 64;
const READ_LEN: usize = 1024;

fn check_crc(header: &[u8; HEADER_LEN]) -> bool {
    let stored = u32::from_be_bytes([header[60], header[61], header[62], header[63]]);
    let calculated = !crc32fast::hash(&header[0..60]);
    stored == calculated
}

#[derive(Default)]
struct State {
    current_file: Option<PathBuf>,
    last_ec_hdr_offset: Option<u64>,
    peb_size: Option<u64>,
}

#[derive(Default)]
pub struct UbiValidPlugin {
    state: Mutex<State>,
}

impl UbiValidPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for UbiValidPlugin {
    fn name(&self) -> &str {
        "ubivalid"
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.description.to_lowercase().starts_with("ubi erase count header") {
            return Ok(());
        }
        let data = match super::read_region(&result.file, result.offset, READ_LEN) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "ubivalid: couldn't re-read erase count header");
                return Ok(());
            }
        };
        if data.len() < HEADER_LEN {
            result.valid = false;
            return Ok(());
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&data[..HEADER_LEN]);
        result.valid = check_crc(&header);
        if !result.valid {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.current_file.as_deref() == Some(result.file.as_path()) {
            result.display = false;
        } else {
            *state = State {
                current_file: Some(result.file.clone()),
                ..State::default()
            };
            result.display = true;
        }

        if state.peb_size.is_none() {
            if let Some(last) = state.last_ec_hdr_offset {
                state.peb_size = Some(result.offset - last);
            } else {
                state.last_ec_hdr_offset = Some(result.offset);
            }
        }
        result.jump = state.peb_size.map_or(0, |s| s as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn sample_result(file: &Path, offset: u64) -> ScanResult {
        ScanResult {
            offset,
            size: 64,
            description: "UBI erase count header".to_string(),
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
            file: file.to_path_buf(),
            module: "sig".to_string(),
        }
    }

    fn build_header() -> Vec<u8> {
        let mut header = vec![0u8; 64];
        header[0..4].copy_from_slice(b"UBI#");
        let crc = !crc32fast::hash(&header[0..60]);
        header[60..64].copy_from_slice(&crc.to_be_bytes());
        header
    }

    #[test]
    fn first_header_sets_display_and_no_jump_yet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubi.img");
        let mut data = build_header();
        data.extend(vec![0u8; 1024]);
        std::fs::File::create(&path).unwrap().write_all(&data).unwrap();

        let plugin = UbiValidPlugin::new();
        let mut result = sample_result(&path, 0);
        plugin.scan(&mut result).unwrap();
        assert!(result.valid);
        assert!(result.display);
        assert_eq!(result.jump, 0);
    }

    #[test]
    fn second_header_derives_peb_size_and_jumps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubi.img");
        let mut data = build_header();
        data.extend(vec![0u8; 1024]);
        std::fs::File::create(&path).unwrap().write_all(&data).unwrap();

        let plugin = UbiValidPlugin::new();
        let mut first = sample_result(&path, 0);
        plugin.scan(&mut first).unwrap();

        let mut second = sample_result(&path, 128 * 1024);
        plugin.scan(&mut second).unwrap();
        assert_eq!(second.jump, 128 * 1024);
        assert!(!second.display);
    }

    #[test]
    fn corrupted_crc_invalidates_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubi.img");
        let mut data = build_header();
        data[0] ^= 0xFF;
        data.extend(vec![0u8; 1024]);
        std::fs::File::create(&path).unwrap().write_all(&data).unwrap();

        let plugin = UbiValidPlugin::new();
        let mut result = sample_result(&path, 0);
        plugin.scan(&mut result).unwrap();
        assert!(!result.valid);
    }
}
