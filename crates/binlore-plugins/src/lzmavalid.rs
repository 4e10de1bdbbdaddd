//! LZMA (legacy "lzma-alone" format) validation, ported from
//! `lzmavalid.py`: trial-decompresses the candidate region through liblzma
//! and rejects signatures that don't actually decode.

use std::io::Read;

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;
use xz2::stream::Stream;

/// Read at most the first 64KB of candidate data; decoding further rarely
/// changes the verdict and keeps the trial cheap.
const MAX_DATA_SIZE: usize = 64 * 1024;

/// Some LZMA-alone streams omit the trailing 8-byte uncompressed-size
/// field; liblzma then needs an explicit "unknown size" marker to decode
/// them at all.
const UNKNOWN_SIZE_MARKER: [u8; 8] = [0xFF; 8];

fn try_decompress(data: &[u8]) -> bool {
    let Ok(stream) = Stream::new_lzma_decoder(u64::MAX) else {
        return true;
    };
    let mut decoder = xz2::read::XzDecoder::new_stream(data, stream);
    let mut sink = Vec::new();
    match decoder.read_to_end(&mut sink) {
        Ok(_) => true,
        // A truncated candidate region decoding partway through is exactly
        // what we'd expect from a real but short sample; only a structural
        // decode error should invalidate the result.
        Err(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
    }
}

/// Tries the data as-is, then (if that fails and there's enough of a
/// header to patch) with a dummy uncompressed-size field spliced in after
/// the properties/dictionary-size bytes. Returns whether it decoded at all,
/// and whether the dummy-size patch was what made it succeed.
fn is_valid_lzma(data: &[u8]) -> (bool, bool) {
    if try_decompress(data) {
        return (true, false);
    }
    if data.len() > 5 {
        let mut patched = Vec::with_capacity(data.len() + UNKNOWN_SIZE_MARKER.len());
        patched.extend_from_slice(&data[..5]);
        patched.extend_from_slice(&UNKNOWN_SIZE_MARKER);
        patched.extend_from_slice(&data[5..]);
        return (try_decompress(&patched), true);
    }
    (false, false)
}

#[derive(Default)]
pub struct LzmaValidPlugin;

impl LzmaValidPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for LzmaValidPlugin {
    fn name(&self) -> &str {
        "lzmavalid"
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.valid || !result.description.to_lowercase().starts_with("lzma compressed data") {
            return Ok(());
        }
        let data = match super::read_region(&result.file, result.offset, MAX_DATA_SIZE) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "lzmavalid: couldn't re-read candidate region");
                return Ok(());
            }
        };

        let (decodes, needed_patch) = is_valid_lzma(&data);
        if !decodes {
            result.valid = false;
            return Ok(());
        }
        if needed_patch {
            result.description = format!("{} missing uncompressed size", result.description);
        }
        Ok(())
    }
}
