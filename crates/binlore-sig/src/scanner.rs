//! Scanner driver: iterates the block source, invokes
//! the match kernel and rule interpreter per signature, and threads results
//! through the plugin bus, result sink, and extraction controller.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use binlore_common::{Error, ExtractionSink, ProgressCounters, ResultSink};

use crate::block::{BlockSource, OpenOptions};
use crate::kernel;
use crate::interp;
use crate::model::Signature;
use crate::plugin::PluginBus;

/// Knobs the CLI layer threads through from the CLI's own configuration
/// layer; not part of the core signature/rule
/// model itself.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub block: OpenOptions,
    pub show_invalid: bool,
}

/// Scan one target file against `signatures`, in confidence-descending
/// order within each block, returning the files the extraction controller
/// enqueued for matryoshka recursion.
#[allow(clippy::too_many_arguments)]
pub fn scan_file(
    signatures: &[Signature],
    path: &Path,
    module: &str,
    opts: &ScanOptions,
    plugins: &PluginBus,
    sink: &mut dyn ResultSink,
    extractor: &mut dyn ExtractionSink,
    progress: Option<&ProgressCounters>,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<PathBuf>, Error> {
    let span = tracing::info_span!("scan", file = %path.display());
    let _enter = span.enter();

    plugins.pre_scan();
    match plugins.load_file(path) {
        Ok(()) => {}
        Err(Error::IgnoreFile) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    }
    plugins.new_file(path);

    let mut source = BlockSource::open(path, opts.block.clone())?;
    let mut sorted_sigs: Vec<&Signature> = signatures.iter().collect();
    sorted_sigs.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let mut matched_offsets: HashSet<u64> = HashSet::new();
    let mut display_once: HashSet<u32> = HashSet::new();
    let mut enqueued = Vec::new();
    let mut skip_until: u64 = 0;
    let mut hit_end = false;
    let mut block_start: u64 = 0;

    loop {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(Error::Cancel);
            }
        }
        let (buf, body_len) = source.read_block()?;
        if body_len == 0 {
            break;
        }

        let mut block_results = Vec::new();
        for sig in &sorted_sigs {
            for o in kernel::find_candidates(sig, &buf, body_len) {
                let abs_offset = block_start + o as u64;
                if abs_offset < skip_until {
                    continue;
                }
                if matched_offsets.contains(&abs_offset) && !opts.show_invalid {
                    continue;
                }
                let Some(mut result) = interp::interpret(sig, &buf, o, path, module, opts.show_invalid) else {
                    continue;
                };
                if result.once && display_once.contains(&sig.id) {
                    continue;
                }
                matched_offsets.insert(abs_offset);
                if result.once {
                    display_once.insert(sig.id);
                }
                // `interp::interpret` resolves offsets relative to the
                // candidate's block-local start; promote to absolute now
                // that the block's base offset is known.
                result.offset += block_start;
                block_results.push(result);
            }
        }
        block_results.sort_by_key(|r| r.offset);

        for mut result in block_results {
            plugins.scan(&mut result);
            sink.emit(&result);
            enqueued.extend(extractor.handle(&result)?);

            if result.jump > 0 {
                let target = result.offset + result.jump as u64;
                skip_until = skip_until.max(target);
            }
            if result.end {
                hit_end = true;
            }
        }

        block_start += body_len as u64;
        if hit_end || body_len < source.block_len() {
            break;
        }
    }

    plugins.post_scan();
    if let Some(p) = progress {
        p.add_completed(1);
    }
    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_signatures;
    use crate::plugin::PluginBus;
    use binlore_common::{NoopExtractionSink, ScanResult};
    use std::io::Write;

    #[derive(Default)]
    struct VecSink {
        results: Vec<ScanResult>,
    }

    impl ResultSink for VecSink {
        fn emit(&mut self, result: &ScanResult) {
            self.results.push(result.clone());
        }
    }

    fn fixture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn single_signature_reports_one_result_at_offset() {
        let sigs = parse_signatures("0 string LZMA LZMA compressed data\n", 0).unwrap();
        let f = fixture(b"xxLZMA....");
        let plugins = PluginBus::new();
        let mut sink = VecSink::default();
        let mut extractor = NoopExtractionSink;
        let enqueued = scan_file(
            &sigs,
            f.path(),
            "sig",
            &ScanOptions::default(),
            &plugins,
            &mut sink,
            &mut extractor,
            None,
            None,
        )
        .unwrap();
        assert!(enqueued.is_empty());
        assert_eq!(sink.results.len(), 1);
        assert_eq!(sink.results[0].offset, 2);
    }

    #[test]
    fn results_within_a_block_are_offset_ordered() {
        let text = "0 string AA first\n0 string BB second\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let f = fixture(b"..BB....AA");
        let plugins = PluginBus::new();
        let mut sink = VecSink::default();
        let mut extractor = NoopExtractionSink;
        scan_file(
            &sigs,
            f.path(),
            "sig",
            &ScanOptions::default(),
            &plugins,
            &mut sink,
            &mut extractor,
            None,
            None,
        )
        .unwrap();
        let offsets: Vec<u64> = sink.results.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![2, 8]);
    }

    #[test]
    fn once_tag_suppresses_repeat_results() {
        let text = "0 string AA repeat{once}\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let f = fixture(b"AA..AA..AA");
        let plugins = PluginBus::new();
        let mut sink = VecSink::default();
        let mut extractor = NoopExtractionSink;
        scan_file(
            &sigs,
            f.path(),
            "sig",
            &ScanOptions::default(),
            &plugins,
            &mut sink,
            &mut extractor,
            None,
            None,
        )
        .unwrap();
        assert_eq!(sink.results.len(), 1);
    }

    #[test]
    fn ignore_file_plugin_skips_scanning() {
        struct Ignorer;
        impl crate::plugin::Plugin for Ignorer {
            fn name(&self) -> &str {
                "ignorer"
            }
            fn load_file(&self, _path: &Path) -> Result<(), Error> {
                Err(Error::IgnoreFile)
            }
        }

        let sigs = parse_signatures("0 string AA match\n", 0).unwrap();
        let f = fixture(b"AA");
        let mut plugins = PluginBus::new();
        plugins.register(Box::new(Ignorer));
        let mut sink = VecSink::default();
        let mut extractor = NoopExtractionSink;
        let enqueued = scan_file(
            &sigs,
            f.path(),
            "sig",
            &ScanOptions::default(),
            &plugins,
            &mut sink,
            &mut extractor,
            None,
            None,
        )
        .unwrap();
        assert!(enqueued.is_empty());
        assert!(sink.results.is_empty());
    }
}
