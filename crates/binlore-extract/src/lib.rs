//! Extraction controller: carving, `extract.conf` rules, external-tool
//! invocation, privilege drop, symlink sanitization, and the matryoshka
//! recursion queue.

pub mod carve;
pub mod controller;
pub mod exec;
pub mod privdrop;
pub mod rules;
pub mod symlink;

pub use binlore_common::Error;
pub use controller::{ExtractionConfig, ExtractionController};
pub use rules::{parse_rules, ExtractRule};
