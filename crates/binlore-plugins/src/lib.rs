//! Built-in plugins ported from `binwalk`'s `plugins/` directory: one module
//! per plugin, each implementing `binlore_sig::Plugin`.

pub mod cpio;
pub mod gzipvalid;
pub mod jffs2valid;
pub mod lzmavalid;
pub mod ubivalid;
pub mod zlibvalid;

pub use cpio::CpioPlugin;
pub use gzipvalid::GzipValidPlugin;
pub use jffs2valid::Jffs2ValidPlugin;
pub use lzmavalid::LzmaValidPlugin;
pub use ubivalid::UbiValidPlugin;
pub use zlibvalid::ZlibValidPlugin;

/// Read up to `max` bytes from `file` starting at `offset`, stopping early
/// at EOF. Every validation plugin re-reads its own candidate region rather
/// than trusting the scanner's block buffer, mirroring the source's
/// `self.module.config.open_file(...)` re-opens.
pub(crate) fn read_region(file: &std::path::Path, offset: u64, max: usize) -> std::io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = std::fs::File::open(file)?;
    f.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; max];
    let n = f.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Pull a value out of a description built from a `tagged format string`
/// like `file size: "1234"`, mirroring the plugins' `description.split(...)`
/// field extraction.
pub(crate) fn extract_quoted_field(description: &str, marker: &str) -> Option<String> {
    let start = description.find(marker)? + marker.len();
    let rest = &description[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}
