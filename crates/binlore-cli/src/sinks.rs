//! `ResultSink` implementations for the CLI: a human-readable text sink
//! (`binwalk`-style `OFFSET   DESCRIPTION` table) and a line-delimited JSON
//! sink for machine consumption.

use binlore_common::{ResultSink, ScanResult};
use serde::Serialize;

pub struct TextResultSink {
    show_invalid: bool,
}

impl TextResultSink {
    #[must_use]
    pub fn new(show_invalid: bool) -> Self {
        Self { show_invalid }
    }
}

impl ResultSink for TextResultSink {
    fn emit(&mut self, result: &ScanResult) {
        if !result.display && !self.show_invalid {
            return;
        }
        println!("{:<12}{}", result.reported_offset(), result.description);
    }
}

#[derive(Serialize)]
struct JsonResult<'a> {
    offset: i64,
    size: u64,
    description: &'a str,
    module: &'a str,
    valid: bool,
    display: bool,
    extract: bool,
}

pub struct JsonResultSink {
    show_invalid: bool,
}

impl JsonResultSink {
    #[must_use]
    pub fn new(show_invalid: bool) -> Self {
        Self { show_invalid }
    }
}

impl ResultSink for JsonResultSink {
    fn emit(&mut self, result: &ScanResult) {
        if !result.display && !self.show_invalid {
            return;
        }
        let row = JsonResult {
            offset: result.reported_offset(),
            size: result.size,
            description: &result.description,
            module: &result.module,
            valid: result.valid,
            display: result.display,
            extract: result.extract,
        };
        match serde_json::to_string(&row) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize result"),
        }
    }
}
