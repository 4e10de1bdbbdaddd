//! JFFS2 node header CRC validation, ported from `jffs2valid.py`.
//!
//! The JFFS2 signature rules catch the obvious cases, but padding between
//! nodes (`0xFF` or `0x00` runs) can make the byte pattern match without a
//! real node there; this plugin re-checks the header CRC to tell real
//! matches apart from padding coincidences.

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;

const HEADER_LEN: usize = 12;
const READ_LEN: usize = 1024;

fn check_crc(header: &[u8; HEADER_LEN]) -> bool {
    let big_endian = header[0..2] == [0x19, 0x85];
    let stored = if big_endian {
        u32::from_be_bytes([header[8], header[9], header[10], header[11]])
    } else {
        u32::from_le_bytes([header[8], header[9], header[10], header[11]])
    };

    // Mirrors `(binascii.crc32(header[0:8], -1) ^ -1) & 0xffffffff`: resume
    // the CRC from the all-ones register rather than the usual zero init.
    let mut hasher = crc32fast::Hasher::new_with_initial(0xFFFF_FFFF);
    hasher.update(&header[0..8]);
    let calculated = hasher.finalize() ^ 0xFFFF_FFFF;

    stored == calculated
}

#[derive(Default)]
pub struct Jffs2ValidPlugin;

impl Jffs2ValidPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for Jffs2ValidPlugin {
    fn name(&self) -> &str {
        "jffs2valid"
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.description.to_lowercase().starts_with("jffs2 filesystem") {
            return Ok(());
        }
        let data = match super::read_region(&result.file, result.offset, READ_LEN) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "jffs2valid: couldn't re-read node header");
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn sample_result(file: &Path) -> ScanResult {
        ScanResult {
            offset: 0,
            size: 12,
            description: "JFFS2 filesystem, little endian".to_string(),
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

    fn build_node(big_endian: bool) -> Vec<u8> {
        let mut header = vec![0u8; 12];
        if big_endian {
            header[0..2].copy_from_slice(&[0x19, 0x85]);
        } else {
            header[0..2].copy_from_slice(&[0x85, 0x19]);
        }
        header[2..4].copy_from_slice(&[0xE0, 0x01]); // node type, arbitrary
        header[4..8].copy_from_slice(&[0, 0, 0, 12]); // total length, arbitrary

        let mut hasher = crc32fast::Hasher::new_with_initial(0xFFFF_FFFF);
        hasher.update(&header[0..8]);
        let crc = hasher.finalize() ^ 0xFFFF_FFFF;
        if big_endian {
            header[8..12].copy_from_slice(&crc.to_be_bytes());
        } else {
            header[8..12].copy_from_slice(&crc.to_le_bytes());
        }
        header
    }

    #[test]
    fn correct_crc_keeps_result_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.jffs2");
        std::fs::File::create(&path).unwrap().write_all(&build_node(true)).unwrap();

        let plugin = Jffs2ValidPlugin::new();
        let mut result = sample_result(&path);
        plugin.scan(&mut result).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn corrupted_crc_invalidates_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.jffs2");
        let mut node = build_node(false);
        node[11] ^= 0xFF;
        std::fs::File::create(&path).unwrap().write_all(&node).unwrap();

        let plugin = Jffs2ValidPlugin::new();
        let mut result = sample_result(&path);
        plugin.scan(&mut result).unwrap();
        assert!(!result.valid);
    }
}
