//! Error categories, one stable kind per failure mode.
//!
//! A small `AppError`-style enum with a manual `Display`/`Error` impl
//! rather than pulling in `thiserror`.

use std::fmt;

/// A rule-parsing failure, identified by the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub line_no: usize,
    pub line: String,
    pub message: String,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signature line {}: {} (`{}`)",
            self.line_no, self.message, self.line
        )
    }
}

impl std::error::Error for ParserError {}

/// Top-level error for the scanning engine and extraction controller.
#[derive(Debug)]
pub enum Error {
    /// Rule syntax, unknown type, bad number, bad regex (*Parser*).
    Parser(ParserError),
    /// A plugin's `load_file` hook asked to skip this file — not surfaced
    /// to the user, just unwinds the current target (*IgnoreFile*).
    IgnoreFile,
    /// Missing dependency or unusable config; surfaces to the CLI as exit 3.
    Module(String),
    /// Target unreadable or carve write failed; aborts the current target only.
    Io(std::io::Error),
    /// External extraction tool missing or failed.
    Subprocess(String),
    /// User interruption, propagated after cleanup.
    Cancel,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parser(e) => write!(f, "{e}"),
            Self::IgnoreFile => write!(f, "file ignored by plugin"),
            Self::Module(msg) => write!(f, "module error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Subprocess(msg) => write!(f, "subprocess error: {msg}"),
            Self::Cancel => write!(f, "scan cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parser(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParserError> for Error {
    fn from(e: ParserError) -> Self {
        Self::Parser(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl Error {
    /// The process exit code a CLI should use.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Module(_) => 3,
            Self::Parser(_) | Self::Io(_) | Self::Subprocess(_) | Self::IgnoreFile | Self::Cancel => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
