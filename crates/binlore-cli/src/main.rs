use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use binlore_cli::{config::BinloreConfig, paths, plugins_builtin, sinks};
use binlore_common::{Error, ExtractionSink, NoopExtractionSink, ProgressCounters, ResultSink};
use binlore_extract::{parse_rules, ExtractionConfig, ExtractionController};
use binlore_sig::{apply_title_filters, parse_signatures, scan_file, OpenOptions, Signature};
use clap::Parser;
use include_dir::{include_dir, Dir};
use regex::bytes::Regex as BytesRegex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// The default signature/extraction-rule set shipped with the binary.
static BUNDLED_SIGNATURES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../signatures");

#[derive(Parser)]
#[command(name = "binlore", version, about = "Magic-signature firmware scanner and extraction controller")]
struct Cli {
    /// Target files to scan
    #[arg(required = false)]
    targets: Vec<PathBuf>,

    /// Additional signature file(s) to load on top of the bundled defaults
    #[arg(long = "magic")]
    magic_files: Vec<PathBuf>,

    /// Skip the bundled default signatures entirely
    #[arg(long)]
    no_default_signatures: bool,

    /// Only report signatures whose title matches this regex (repeatable)
    #[arg(long = "include")]
    include_titles: Vec<String>,

    /// Drop signatures whose title matches this regex (repeatable)
    #[arg(long = "exclude")]
    exclude_titles: Vec<String>,

    /// Show results marked invalid (normally suppressed)
    #[arg(long)]
    show_invalid: bool,

    /// Emit line-delimited JSON instead of the default text table
    #[arg(long)]
    json: bool,

    /// Path to a `config.toml`; defaults to the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block read size, bytes
    #[arg(long)]
    block_size: Option<usize>,

    /// Peek-tail size, bytes
    #[arg(long)]
    peek_size: Option<usize>,

    /// Byte-swap group size (0 disables)
    #[arg(long)]
    swap: Option<usize>,

    /// Carve and run external tools for extractable matches
    #[arg(long)]
    extract: bool,

    /// Path to an `extract.conf`; defaults to the bundled rule set
    #[arg(long)]
    extract_conf: Option<PathBuf>,

    /// Base directory extraction output directories are created under
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Nest carved output under `0xHHHHHHHH/` subdirectories
    #[arg(long)]
    subdirs: bool,

    /// Recurse into extracted files up to this depth (omit to disable)
    #[arg(long)]
    matryoshka_depth: Option<u32>,

    /// Cap bytes carved per match
    #[arg(long)]
    max_size: Option<u64>,

    /// Cap total carved files per target
    #[arg(long)]
    max_count: Option<u64>,

    /// uid to drop privileges to before running extraction tools
    #[arg(long)]
    run_as_uid: Option<u32>,

    /// gid to drop privileges to before running extraction tools
    #[arg(long)]
    run_as_gid: Option<u32>,

    /// Disable symlink sanitization of extracted trees
    #[arg(long)]
    no_sanitize_symlinks: bool,

    /// Remove the carved file once a tool has consumed it unmodified
    #[arg(long)]
    rm: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "binlore=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_signatures(cli: &Cli) -> Result<Vec<Signature>, Error> {
    let mut text = String::new();
    if !cli.no_default_signatures {
        if let Some(file) = BUNDLED_SIGNATURES.get_file("default.magic") {
            text.push_str(file.contents_utf8().unwrap_or_default());
            text.push('\n');
        }
    }
    for path in &cli.magic_files {
        text.push_str(&std::fs::read_to_string(path)?);
        text.push('\n');
    }

    let signatures = parse_signatures(&text, 0)?;

    let compile = |patterns: &[String]| -> Result<Vec<BytesRegex>, Error> {
        patterns
            .iter()
            .map(|p| BytesRegex::new(p).map_err(|e| Error::Module(format!("bad title filter {p:?}: {e}"))))
            .collect()
    };
    let include = compile(&cli.include_titles)?;
    let exclude = compile(&cli.exclude_titles)?;
    Ok(apply_title_filters(signatures, &include, &exclude))
}

fn load_extract_rules(cli: &Cli) -> Result<Vec<binlore_extract::ExtractRule>, Error> {
    let text = match &cli.extract_conf {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUNDLED_SIGNATURES
            .get_file("extract.conf")
            .and_then(|f| f.contents_utf8())
            .unwrap_or_default()
            .to_string(),
    };
    parse_rules(&text)
}

fn build_extraction_config(cli: &Cli, config: &BinloreConfig) -> Result<ExtractionConfig, Error> {
    let extract_cfg = config.extract.clone().unwrap_or_default();
    let run_as = config.run_as.clone().unwrap_or_default();
    Ok(ExtractionConfig {
        rules: load_extract_rules(cli)?,
        base_dir: cli.directory.clone().unwrap_or_else(|| PathBuf::from(".")),
        subdirs: cli.subdirs || extract_cfg.subdirs.unwrap_or(false),
        matryoshka_depth: cli.matryoshka_depth.or(extract_cfg.matryoshka_depth),
        max_size: cli.max_size.or(extract_cfg.max_size),
        max_count: cli.max_count.or(extract_cfg.max_count),
        swap: cli.swap.map(|s| s as u64).unwrap_or(0),
        run_as_uid: cli.run_as_uid.or(run_as.uid),
        run_as_gid: cli.run_as_gid.or(run_as.gid),
        sanitize_symlinks: !cli.no_sanitize_symlinks && extract_cfg.sanitize_symlinks.unwrap_or(true),
        remove_after_execute: cli.rm || extract_cfg.remove_after_execute.unwrap_or(false),
    })
}

fn scan_target(
    signatures: &[Signature],
    target: &Path,
    opts: &binlore_sig::ScanOptions,
    plugins: &binlore_sig::PluginBus,
    sink: &mut dyn ResultSink,
    cli: &Cli,
    config: &BinloreConfig,
) -> Result<Vec<PathBuf>, Error> {
    let progress = ProgressCounters::default();
    let cancel = AtomicBool::new(false);

    if cli.extract {
        let extraction_config = build_extraction_config(cli, config)?;
        let mut controller = ExtractionController::new(extraction_config, target)?;
        scan_file(signatures, target, "sig", opts, plugins, sink, &mut controller, Some(&progress), Some(&cancel))
    } else {
        let mut noop = NoopExtractionSink;
        scan_file(signatures, target, "sig", opts, plugins, sink, &mut noop, Some(&progress), Some(&cancel))
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config_path = cli
        .config
        .clone()
        .or_else(|| paths::user_dir().map(|d| d.join("config.toml")));
    let config = match config_path {
        Some(path) => BinloreConfig::load(&path)?,
        None => BinloreConfig::default(),
    };

    let signatures = load_signatures(cli)?;
    let plugins = plugins_builtin::default_plugin_bus();
    let opts = binlore_sig::ScanOptions {
        block: OpenOptions {
            swap: cli.swap.or(config.swap).unwrap_or(0),
            block: cli.block_size.or(config.block_size).unwrap_or(1_000_000),
            peek: cli.peek_size.or(config.peek_size).unwrap_or(1024),
            ..OpenOptions::default()
        },
        show_invalid: cli.show_invalid,
    };

    let mut sink: Box<dyn ResultSink> = if cli.json {
        Box::new(sinks::JsonResultSink::new(cli.show_invalid))
    } else {
        Box::new(sinks::TextResultSink::new(cli.show_invalid))
    };

    let mut queue: VecDeque<PathBuf> = cli.targets.iter().cloned().collect();
    while let Some(target) = queue.pop_front() {
        match scan_target(&signatures, &target, &opts, &plugins, sink.as_mut(), cli, &config) {
            Ok(enqueued) => queue.extend(enqueued),
            Err(Error::IgnoreFile) => continue,
            Err(e @ Error::Io(_)) => {
                tracing::warn!(error = %e, target = %target.display(), "target aborted");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if cli.targets.is_empty() {
        eprintln!("binlore: no target files given");
        std::process::exit(1);
    }

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("binlore: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
