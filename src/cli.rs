// Command-line shell for blockdedup.
//
// Thin wrapper over the `io` entry points: argument parsing, progress dots,
// the dedup summary and the peak-memory report.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::engine::{DedupOptions, DiffStats};
use crate::hash::config::{DEFAULT_BLOCK_SIZE, DEFAULT_PROGRESS_INTERVAL, cache_extension};
use crate::monitor::{PeakSampler, rss_probe};
use crate::progress::{Progress, ProgressEvent, Stage};
use crate::script::{self, RestoreScript};

const MEM_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_block_size(s: &str) -> Result<usize, String> {
    let n = parse_byte_size(s)?;
    if n == 0 {
        return Err("block size must be non-zero".into());
    }
    usize::try_from(n).map_err(|_| format!("block size too large: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Fixed-block deduplication of a child file against a base file.
#[derive(Parser, Debug)]
#[command(
    name = "blockdedup",
    version,
    about = "Fixed-block deduplication of a child file against a base file",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress progress and summaries).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stdout.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Hash a file's blocks and write the hash list.
    Hash(HashArgs),
    /// Deduplicate a child file against a base file.
    #[command(visible_alias = "dedup")]
    Diff(DiffArgs),
    /// Rebuild a child file from its base and a diff.
    Restore(RestoreArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// Block size (supports K/M/G suffix). Must match between dedup and restore.
    #[arg(long = "block-size", short = 'b', value_parser = parse_block_size, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Progress cadence in blocks.
    #[arg(long = "progress-interval", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Do not read or write hash cache sidecars.
    #[arg(long = "no-cache")]
    no_cache: bool,
}

#[derive(Args, Debug)]
struct HashArgs {
    /// File to hash.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Hash list output (default: the input's cache sidecar).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Base file (the version blocks are reused from).
    #[arg(value_hint = ValueHint::FilePath)]
    base: PathBuf,

    /// Child file (the new version).
    #[arg(value_hint = ValueHint::FilePath)]
    child: PathBuf,

    /// Diff artifact to write.
    #[arg(value_hint = ValueHint::FilePath)]
    diff: PathBuf,

    /// Do not print progress.
    #[arg(short = 's', long)]
    silent: bool,

    /// Also write a shell script that restores the child.
    #[arg(long, value_hint = ValueHint::FilePath)]
    script: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    /// Base file the diff was made against.
    #[arg(value_hint = ValueHint::FilePath)]
    base: PathBuf,

    /// Where to write the restored child.
    #[arg(value_hint = ValueHint::FilePath)]
    child: PathBuf,

    /// Diff artifact to read.
    #[arg(value_hint = ValueHint::FilePath)]
    diff: PathBuf,

    #[command(flatten)]
    tuning: TuningArgs,
}

impl TuningArgs {
    fn options(&self) -> DedupOptions {
        DedupOptions {
            block_size: self.block_size,
            progress_interval: self.progress_interval,
            use_cache: !self.no_cache,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress dots
// ---------------------------------------------------------------------------

/// Prints `.` per interval to stderr, or `#` for a diff interval that
/// produced new blocks.
struct Dots {
    enabled: bool,
    dirty: bool,
}

impl Dots {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            dirty: false,
        }
    }
}

impl Progress for Dots {
    fn tick(&mut self, event: ProgressEvent) {
        if !self.enabled {
            return;
        }
        let mark = if event.stage == Stage::Diff && event.fresh {
            b'#'
        } else {
            b'.'
        };
        let mut err = io::stderr().lock();
        let _ = err.write_all(&[mark]);
        let _ = err.flush();
        self.dirty = true;
    }

    fn finish(&mut self, _stage: Stage) {
        if self.enabled && self.dirty {
            eprintln!();
            self.dirty = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct Global {
    force: bool,
    quiet: bool,
    json: bool,
}

fn check_output(path: &Path, g: &Global) -> Result<(), String> {
    if path.exists() && !g.force {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        ));
    }
    Ok(())
}

fn cmd_hash(args: &HashArgs, g: &Global) -> Result<(), String> {
    if let Some(out) = &args.output {
        check_output(out, g)?;
    }
    let opts = args.tuning.options();
    let mut dots = Dots::new(!g.quiet);
    let index = crate::io::compute_hash_index(&args.input, args.output.as_deref(), &opts, &mut dots)
        .map_err(|e| format!("{}: {e}", args.input.display()))?;

    if g.json {
        let json = serde_json::json!({
            "command": "hash",
            "blocks": index.len(),
            "distinct": index.distinct(),
            "block_size": opts.block_size,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    } else if !g.quiet {
        eprintln!(
            "blockdedup: hashed {} blocks ({} distinct)",
            index.len(),
            index.distinct()
        );
    }
    Ok(())
}

fn cmd_diff(args: &DiffArgs, g: &Global) -> Result<(), String> {
    check_output(&args.diff, g)?;
    if let Some(path) = &args.script {
        check_output(path, g)?;
    }
    let opts = args.tuning.options();
    let mut dots = Dots::new(!g.quiet && !args.silent);
    let stats = crate::io::diff(&args.base, &args.child, &args.diff, &opts, &mut dots)
        .map_err(|e| format!("dedup: {e}"))?;

    if let Some(path) = &args.script {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("blockdedup"));
        let restore = RestoreScript {
            program,
            base: absolute(&args.base),
            child: absolute(&args.child),
            diff: absolute(&args.diff),
            block_size: opts.block_size,
        };
        script::write_restore_script(path, &restore)
            .map_err(|e| format!("{}: {e}", path.display()))?;
    }

    if g.json {
        println!("{}", diff_json(&stats));
    } else if !g.quiet {
        print_diff_summary(&stats);
    }
    Ok(())
}

fn cmd_restore(args: &RestoreArgs, g: &Global) -> Result<(), String> {
    check_output(&args.child, g)?;
    let opts = args.tuning.options();
    let mut dots = Dots::new(!g.quiet);
    let stats = crate::io::restore(&args.base, &args.diff, &args.child, &opts, &mut dots)
        .map_err(|e| format!("restore: {e}"))?;

    if g.json {
        let json = serde_json::json!({
            "command": "restore",
            "blocks": stats.blocks,
            "from_base": stats.from_base,
            "from_diff": stats.from_diff,
            "output_size": stats.output_size,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    } else if !g.quiet {
        eprintln!(
            "blockdedup: restored {} bytes ({} blocks from base, {} from diff)",
            stats.output_size, stats.from_base, stats.from_diff
        );
    }
    Ok(())
}

fn cmd_config() {
    let version = env!("CARGO_PKG_VERSION");
    println!("blockdedup version {version}");
    println!("HASH=sha256");
    println!("DEFAULT_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    println!("DEFAULT_PROGRESS_INTERVAL={DEFAULT_PROGRESS_INTERVAL}");
    println!("CACHE_EXTENSION={}", cache_extension(DEFAULT_BLOCK_SIZE));
    println!("RECORD_LEN={}", crate::format::RECORD_LEN);
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

fn print_diff_summary(stats: &DiffStats) {
    println!(" Block size:          {:8.3} KB", stats.block_size as f64 / 1024.0);
    println!(" Unique blocks:       {:8}", stats.new);
    println!(" Deduplicated blocks: {:8}", stats.matched);
    println!(" Deduplication rate:  {:8.3} %", stats.dedup_rate());
    println!(" Child file size:   {:10.3} MB", mib(stats.child_size));
    println!(" Unique data size:  {:10.3} MB", mib(stats.payload_bytes));
    println!(" Diff file size:    {:10.3} MB", mib(stats.diff_size()));
}

fn diff_json(stats: &DiffStats) -> String {
    let json = serde_json::json!({
        "command": "dedup",
        "block_size": stats.block_size,
        "unique_blocks": stats.new,
        "deduplicated_blocks": stats.matched,
        "dedup_rate": stats.dedup_rate(),
        "child_size": stats.child_size,
        "unique_data_size": stats.payload_bytes,
        "diff_size": stats.diff_size(),
    });
    serde_json::to_string_pretty(&json).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.quiet, cli.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let started = Instant::now();
    let sampler = PeakSampler::start(MEM_SAMPLE_INTERVAL, rss_probe());

    let g = Global {
        force: cli.force,
        quiet: cli.quiet,
        json: cli.json_output,
    };

    let result = match &cli.command {
        Cmd::Hash(args) => cmd_hash(args, &g),
        Cmd::Diff(args) => cmd_diff(args, &g),
        Cmd::Restore(args) => cmd_restore(args, &g),
        Cmd::Config => {
            cmd_config();
            Ok(())
        }
    };

    let peak = sampler.stop();
    let code = match result {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("blockdedup: {msg}");
            1
        }
    };

    if !g.quiet && !matches!(cli.command, Cmd::Config) {
        let secs = started.elapsed().as_secs();
        eprintln!(
            "blockdedup: done in {}:{:02}; maximum RAM usage {:.0} MB",
            secs / 60,
            secs % 60,
            mib(peak)
        );
    }

    process::exit(code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
