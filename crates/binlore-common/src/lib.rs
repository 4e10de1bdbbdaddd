pub mod error;
pub mod progress;
pub mod result;
pub mod sink;
pub mod tags;

pub use error::{Error, ParserError, Result};
pub use progress::{ProgressCounters, ProgressSnapshot};
pub use result::ScanResult;
pub use sink::{ExtractionSink, NoopExtractionSink, ResultSink};
pub use tags::{TagValue, Tags};
