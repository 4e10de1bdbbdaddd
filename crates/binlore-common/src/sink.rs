//! Output seams the scanner driver writes through. Kept here rather than in
//! `binlore-sig` so the extraction crate can implement `ExtractionSink`
//! without creating a dependency cycle back onto the engine crate.

use std::path::PathBuf;

use crate::error::Error;
use crate::result::ScanResult;

/// Where emitted results go. An opt-in, `Send + Sync`, zero-cost no-op
/// default (`NoopExtractionSink` below) lets callers skip extraction
/// entirely without branching at every call site.
pub trait ResultSink: Send + Sync {
    fn emit(&mut self, result: &ScanResult);
}

/// The extraction controller's entry point from the scanner driver.
/// Returns paths newly enqueued for matryoshka recursion. A carving I/O
/// failure is the one `handle` error that aborts the scan for the current
/// target; everything else (a failed external tool, a bad rule match) is
/// handled internally.
pub trait ExtractionSink: Send + Sync {
    fn handle(&mut self, result: &ScanResult) -> Result<Vec<PathBuf>, Error>;
}

/// Used when extraction is disabled; every call is a no-op.
#[derive(Debug, Default)]
pub struct NoopExtractionSink;

impl ExtractionSink for NoopExtractionSink {
    fn handle(&mut self, _result: &ScanResult) -> Result<Vec<PathBuf>, Error> {
        Ok(Vec::new())
    }
}
