//! Gzip stream validation, ported from `gzipvalid.py`: skips the gzip
//! header's optional fields, synthesizes a bare zlib header in front of the
//! raw deflate payload, and trial-inflates it.

use std::io::Read;

use binlore_common::{Error, ScanResult};
use binlore_sig::Plugin;
use flate2::read::ZlibDecoder;

/// Matches the Python plugin's own 33KB read cap.
const MAX_DATA_SIZE: usize = 33 * 1024;

/// `FEXTRA` and `FNAME`/`FCOMMENT` flag bits in the gzip header's flags byte
/// (offset 3). Either bit means there's a variable-length field to skip
/// before the deflate payload starts.
const FEXTRA_OR_FNAME: u8 = 0x0C;
const FCOMMENT: u8 = 0x10;

/// Standard zlib header for "deflate, 32K window, default compression" --
/// used here purely as a wrapper so `flate2`'s zlib decoder will accept a
/// raw deflate stream that gzip framed differently.
const FAKE_ZLIB_HEADER: [u8; 2] = [0x78, 0x9C];

/// Gzip's fixed header is 10 bytes: magic (2), compression method (1),
/// flags (1), mtime (4), extra flags (1), OS (1).
const FIXED_HEADER_LEN: usize = 10;

fn deflate_payload_offset(data: &[u8]) -> Option<usize> {
    let flags = *data.get(3)?;
    if flags & (FEXTRA_OR_FNAME | FCOMMENT) == 0 {
        return Some(FIXED_HEADER_LEN);
    }
    // FNAME/FCOMMENT are NUL-terminated strings right after the fixed
    // header; walk to the terminator and step past it.
    let mut i = FIXED_HEADER_LEN;
    while i < data.len() && data[i] != 0 {
        i += 1;
    }
    if i >= data.len() {
        return None;
    }
    Some(i + 1)
}

fn try_inflate(data: &[u8]) -> bool {
    let Some(payload_offset) = deflate_payload_offset(data) else {
        return false;
    };
    if payload_offset >= data.len() {
        return false;
    }
    let mut framed = Vec::with_capacity(2 + data.len() - payload_offset);
    framed.extend_from_slice(&FAKE_ZLIB_HEADER);
    framed.extend_from_slice(&data[payload_offset..]);

    let mut decoder = ZlibDecoder::new(framed.as_slice());
    let mut sink = Vec::new();
    match decoder.read_to_end(&mut sink) {
        Ok(_) => true,
        Err(e) => {
            // A truncated sample decoding partway through is expected. Gzip
            // also trails with a CRC32 + size footer that zlib's own
            // Adler32 checksum will never validate, so a trailing checksum
            // mismatch isn't a reason to call the stream invalid either.
            matches!(e.kind(), std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidInput)
        }
    }
}

#[derive(Default)]
pub struct GzipValidPlugin;

impl GzipValidPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for GzipValidPlugin {
    fn name(&self) -> &str {
        "gzipvalid"
    }

    fn scan(&self, result: &mut ScanResult) -> Result<(), Error> {
        if !result.valid || !result.description.to_lowercase().starts_with("gzip compressed data") {
            return Ok(());
        }
        let data = match super::read_region(&result.file, result.offset, MAX_DATA_SIZE) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "gzipvalid: couldn't re-read candidate region");
                return Ok(());
            }
        };
        result.valid = try_inflate(&data);
        Ok(())
    }
}
