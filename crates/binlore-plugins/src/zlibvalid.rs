//! Raw zlib stream validation, ported from `zlibvalid.py`: trial-inflates
//! the candidate region and rejects signatures that don't actually decode.

use std::io::Read;

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;
use flate2::read::ZlibDecoder;

/// Matches the Python plugin's own 33KB read cap.
const MAX_DATA_SIZE: usize = 33 * 1024;

fn try_inflate(data: &[u8]) -> bool {
    let mut decoder = ZlibDecoder::new(data);
    let mut sink = Vec::new();
    match decoder.read_to_end(&mut sink) {
        Ok(_) => true,
        // A truncated candidate region ending mid-stream is expected for a
        // short sample; anything else means the bytes never were zlib.
        Err(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
    }
}

#[derive(Default)]
pub struct ZlibValidPlugin;

impl ZlibValidPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ZlibValidPlugin {
    fn name(&self) -> &str {
        "zlibvalid"
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.valid || !result.description.to_lowercase().starts_with("zlib compressed data") {
            return Ok(());
        }
        // The source re-derives its own swap alignment rather than trusting
        // the caller's adjusted offset; `result.adjust` already carries it.
        let offset = (result.offset as i64 - result.adjust).max(0) as u64;
        let data = match super::read_region(&result.file, offset, MAX_DATA_SIZE) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "zlibvalid: couldn't re-read candidate region");
                return Ok(());
            }
        };
        result.valid = try_inflate(&data);
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
            size: 2,
            description: "zlib compressed data".to_string(),
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

    fn zlib_bytes(raw: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn real_zlib_stream_stays_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zlib");
        let bytes = zlib_bytes(b"hello binlore, this is a real zlib stream");
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let plugin = ZlibValidPlugin::new();
        let mut result = sample_result(&path);
        plugin.scan(&mut result).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn truncated_stream_is_still_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zlib");
        let mut bytes = zlib_bytes(b"hello binlore, this is a real zlib stream");
        bytes.truncate(bytes.len() - 4);
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let plugin = ZlibValidPlugin::new();
        let mut result = sample_result(&path);
        plugin.scan(&mut result).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zlib");
        std::fs::File::create(&path).unwrap().write_all(&[0xDE, 0xAD, 0xBE, 0xEF, 1, 2, 3, 4]).unwrap();

        let plugin = ZlibValidPlugin::new();
        let mut result = sample_result(&path);
        plugin.scan(&mut result).unwrap();
        assert!(!result.valid);
    }
}
