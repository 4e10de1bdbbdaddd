//! Carving (ported from `extractor.py`'s `_dd`).

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Build `<base>.<extension>` inside `dir`, uniquified by inserting `-N`
/// before the extension on collision.
pub fn unique_carve_name(dir: &Path, base: &str, extension: &str) -> PathBuf {
    let plain = dir.join(format!("{base}.{extension}"));
    if !plain.exists() {
        return plain;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{base}-{n}.{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Copy `size` bytes (capped by `max_size`) from `source` starting at
/// `offset`, swap-size-aligned, into a new carved file under `output_dir`.
/// Returns the carved file's path.
pub fn carve(
    source: &Path,
    offset: u64,
    size: u64,
    swap: u64,
    max_size: Option<u64>,
    extension: &str,
    output_dir: &Path,
    name_override: Option<&str>,
) -> std::io::Result<PathBuf> {
    let adjust = if swap > 0 { offset % swap } else { 0 };
    let aligned = offset - adjust;
    let capped_size = max_size.map_or(size, |m| size.min(m));

    let mut fdin = File::open(source)?;
    fdin.seek(SeekFrom::Start(aligned))?;
    let mut raw = vec![0u8; (capped_size + adjust) as usize];
    let read = fdin.read(&mut raw)?;
    raw.truncate(read);
    if (adjust as usize) < raw.len() {
        raw.drain(..adjust as usize);
    } else {
        raw.clear();
    }
    raw.truncate(capped_size as usize);

    let default_bname = format!("{offset:X}");
    let base = name_override.map_or(default_bname.as_str(), |n| n);
    let path = unique_carve_name(output_dir, base, extension);
    let mut fdout = File::create(&path)?;
    fdout.write_all(&raw)?;
    Ok(path)
}

/// MD5 of a file's current contents, used to decide whether an extraction
/// tool modified the carved file in place.
pub fn file_md5(path: &Path) -> std::io::Result<[u8; 16]> {
    use md5::{Digest, Md5};
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Snapshot of regular-file/symlink paths directly inside `dir`, used to
/// diff which files an extraction command created.
pub fn snapshot_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn carve_reads_requested_span() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.bin");
        std::fs::File::create(&src)
            .unwrap()
            .write_all(b"xxLZMA0123456789")
            .unwrap();
        let out = carve(&src, 2, 6, 0, None, "lzma", dir.path(), None).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"LZMA01");
    }

    #[test]
    fn swap_alignment_trims_leading_partial_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.bin");
        std::fs::File::create(&src)
            .unwrap()
            .write_all(b"00112233LZMA")
            .unwrap();
        // offset 10 with swap 4 aligns to 8, reading 2 extra leading bytes
        // that are then discarded.
        let out = carve(&src, 10, 4, 4, None, "lzma", dir.path(), None).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"MA");
    }

    #[test]
    fn max_size_caps_carved_length() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.bin");
        std::fs::File::create(&src).unwrap().write_all(b"ABCDEFGH").unwrap();
        let out = carve(&src, 0, 8, 0, Some(3), "bin", dir.path(), None).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"ABC");
    }

    #[test]
    fn collisions_are_uniquified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.bin"), b"a").unwrap();
        let name = unique_carve_name(dir.path(), "0", "bin");
        assert_eq!(name, dir.path().join("0-1.bin"));
    }
}
