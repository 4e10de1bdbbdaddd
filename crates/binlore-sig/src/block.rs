//! Block source: streams a target as overlapping
//! `(body, peek)` windows with stable absolute offsets.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Parameters for [`BlockSource::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub offset: u64,
    pub length: Option<u64>,
    pub swap: usize,
    pub block: usize,
    pub peek: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            length: None,
            swap: 0,
            block: 1_000_000,
            peek: 1024,
        }
    }
}

pub struct BlockSource {
    file: File,
    path: PathBuf,
    opts: OpenOptions,
    total_read: u64,
}

fn reverse_runs(data: &mut [u8], swap: usize) {
    for chunk in data.chunks_exact_mut(swap) {
        chunk.reverse();
    }
}

/// Read until `buf` is full or EOF, coalescing short reads so a `read(2)`
/// returning fewer bytes than requested doesn't look like a truncated file.
fn read_coalesced(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

impl BlockSource {
    pub fn open(path: impl AsRef<Path>, opts: OpenOptions) -> io::Result<Self> {
        if opts.swap > 0 && opts.block % opts.swap != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block size must be a multiple of swap",
            ));
        }
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(opts.offset))?;
        Ok(Self {
            file,
            path,
            opts,
            total_read: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    pub fn seek(&mut self, pos: i64, whence: Whence) -> io::Result<u64> {
        let from = match whence {
            Whence::Start => SeekFrom::Start(pos as u64),
            Whence::Current => SeekFrom::Current(pos),
            Whence::End => SeekFrom::End(pos),
        };
        self.file.seek(from)
    }

    /// Read up to `n` bytes, bounded by `length` unless `override_limit` is
    /// set (a peek read past the logical end, used for tail-context
    /// lookahead, passes `override_limit=true`).
    pub fn read(&mut self, n: usize, override_limit: bool) -> io::Result<Vec<u8>> {
        let allowed = if override_limit {
            n
        } else {
            match self.opts.length {
                Some(length) => {
                    let remaining = length.saturating_sub(self.total_read);
                    n.min(remaining as usize)
                }
                None => n,
            }
        };
        let mut buf = vec![0u8; allowed];
        let filled = read_coalesced(&mut self.file, &mut buf)?;
        buf.truncate(filled);
        Ok(buf)
    }

    /// Look ahead without consuming (restores the file position afterward).
    pub fn peek(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let pos = self.tell()?;
        let data = self.read(n, false)?;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(data)
    }

    /// Read the next `(body, peek)` window. The returned buffer is
    /// `body_len + peek_len` bytes; the next call restarts immediately
    /// after `body_len`, not after the peek tail.
    pub fn read_block(&mut self) -> io::Result<(Vec<u8>, usize)> {
        let want = self.opts.block + self.opts.peek;
        let mut data = self.read(want, false)?;
        let body_len = data.len().min(self.opts.block);
        let extra = data.len() - body_len;
        if extra > 0 {
            self.file.seek(SeekFrom::Current(-(extra as i64)))?;
        }
        self.total_read += body_len as u64;
        if self.opts.swap > 1 {
            reverse_runs(&mut data, self.opts.swap);
        }
        Ok((data, body_len))
    }

    #[must_use]
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    #[must_use]
    pub fn block_len(&self) -> usize {
        self.opts.block
    }

    #[must_use]
    pub fn peek_len(&self) -> usize {
        self.opts.peek
    }
}
