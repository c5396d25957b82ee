//! bindview - Terminal Binding-Score Viewer
//!
//! Plots per-position binding scores of a scoring server's response.
//!
//! ## Usage
//!
//! ```bash
//! bindview <response.json>
//! bindview --convention exclusive --ref wt <response.json>
//! bindview --dump - <response.json>   # processed session as JSON
//! ```
//!
//! ## Navigation (Vim-style)
//!
//! - `h/l`: Pan left/right
//! - `+/-`: Zoom in/out, `0`: reset
//! - `Tab`: Next chart, `j/k`: next/previous sequence
//! - `:q`: Quit

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use bindview::align::PrefixConvention;
use bindview::config::Config;
use bindview::controller::run_app;
use bindview::pipeline::{process, Session};
use bindview::plot_data::PlotData;
use bindview::state::AppState;

/// Prefix length convention for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConventionArg {
    /// Prefix of L-n+1 bases
    Inclusive,
    /// Prefix of L-n bases
    Exclusive,
}

impl From<ConventionArg> for PrefixConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Inclusive => PrefixConvention::Inclusive,
            ConventionArg::Exclusive => PrefixConvention::Exclusive,
        }
    }
}

/// bindview - A terminal viewer for binding-affinity scores
///
/// Without --dump, opens an interactive viewer with one linked chart per
/// score file. With --dump, writes the processed session as JSON to a file
/// (or stdout with "-").
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server response to display (JSON)
    file: PathBuf,

    /// Display configuration (YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Prefix length convention used to rebuild gapped sequences
    #[arg(long = "convention", value_enum)]
    convention: Option<ConventionArg>,

    /// Show base labels when fewer positions than this are visible
    #[arg(long = "label-window")]
    label_window: Option<usize>,

    /// Reference sequence name (overrides the response's ref_name)
    #[arg(short = 'r', long = "ref")]
    reference: Option<String>,

    /// Only show binding sites that differ from the reference
    #[arg(long = "diff-only")]
    diff_only: bool,

    /// Keep one binding site per distinct substring
    #[arg(long = "dedupe")]
    dedupe: bool,

    /// Write the processed session as JSON (enables CLI mode). Use "-" for stdout.
    #[arg(short = 'o', long = "dump")]
    dump: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Log file (interactive mode logs to a temporary file by default)
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Configuration file values with command line overrides applied.
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_yaml(path)?,
            None => Config::default(),
        };
        if let Some(convention) = self.convention {
            config.prefix_convention = convention.into();
        }
        if let Some(window) = self.label_window {
            config.label_window = window;
        }
        config.diff_only |= self.diff_only;
        config.dedupe_sites |= self.dedupe;
        config.validate()?;
        Ok(config)
    }
}

/// Initializes logging; returns the log file, if any.
fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let log_level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));
    if let Some(path) = &log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(log_file)
}

/// A fresh log file name in the temp directory.
fn temp_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("bindview-{:08x}.log", rand::random::<u32>()))
}

/// Runs CLI mode: write the processed session as JSON.
fn run_dump_mode(session: &Session, output: &str) -> Result<()> {
    if output == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer_pretty(&mut handle, session)?;
        writeln!(handle)?;
    } else {
        let mut file = File::create(output).with_context(|| format!("Failed to create {}", output))?;
        serde_json::to_writer_pretty(&mut file, session)?;
        writeln!(file)?;
        eprintln!(
            "Wrote {} tracks ({} failed) to {}",
            session.track_count(),
            session.errors.len(),
            output
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The interactive viewer owns the terminal, so its logs go to a file
    let log_file = match (&args.dump, &args.log_file) {
        (_, Some(path)) => Some(path.clone()),
        (None, None) => Some(temp_log_path()),
        (Some(_), None) => None,
    };
    let log_file = init_logging(args.verbose, log_file)?;

    let config = args.config()?;
    info!("bindview v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading {}", args.file.display());

    let mut data = PlotData::from_json_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    if let Some(reference) = &args.reference {
        if !data.sequence_strs.contains_key(reference) {
            anyhow::bail!("Unknown reference sequence: {}", reference);
        }
        data.ref_name = Some(reference.clone());
    }

    let session = process(&data, &config)?;

    if let Some(output) = &args.dump {
        return run_dump_mode(&session, output);
    }

    let failed = session.errors.len();
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    run_app(AppState::new(session, file_name, config.label_window))?;

    if failed > 0 {
        if let Some(path) = log_file {
            eprintln!("{} tracks could not be aligned, see {}", failed, path.display());
        }
    }
    Ok(())
}
