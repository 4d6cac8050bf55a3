//! # canopy-cli
//!
//! Binary entry point for the canopy test runner.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Configuration loading and override merging
//! - Wiring the JSONL engine adapter (stdin or a file) into the run
//!   controller and mapping the run outcome to a process exit code

use anyhow::{Context, Result};
use canopy_core::{
    HookSet, HookSource, JsonlEngine, MaxErrors, RunConfig, RunController, RunReport,
};
use clap::{Parser, ValueEnum};
use std::io::{stdout, IsTerminal};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// canopy - console test runner
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about)]
struct Cli {
    /// Directory the engine resolves test files against [default: .]
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Global timeout in milliseconds for hooks and the engine
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Test-file pattern, passed through to the engine
    #[arg(long)]
    pattern: Option<String>,

    /// Bail out after this many errors (a number, or "unbounded")
    #[arg(long = "maxErrors")]
    max_errors: Option<MaxErrors>,

    /// Maximum stack lines rendered per error
    #[arg(long = "maxStack")]
    max_stack: Option<usize>,

    /// Emit per-hook duration lines
    #[arg(short, long)]
    verbose: bool,

    /// Suppress block headers and the pending section
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to configuration file (default: canopy.yml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read engine events from this JSONL file instead of stdin
    #[arg(long)]
    events: Option<PathBuf>,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
}

const DEFAULT_CONFIG_FILE: &str = "canopy.yml";

/// Hook acquisition for the standalone binary.
///
/// Embedders supply their own `HookSource` (module discovery, dynamic
/// loading); the binary itself registers no hooks.
struct NoHooks;

impl HookSource for NoHooks {
    fn load(&self) -> std::result::Result<HookSet, String> {
        Ok(HookSet::new())
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(report) => std::process::exit(report.exit_code()),
        Err(error) => {
            eprintln!("canopy: {error:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<RunReport> {
    let cli = Cli::parse();

    // Logging goes to stderr so it never interleaves with the report.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    colored::control::set_override(cli.color.should_use_colors());

    let config = load_config(&cli)?;
    config.validate().context("invalid configuration")?;
    debug!(
        timeout_ms = config.timeout_ms,
        directory = %config.directory.display(),
        "Configuration resolved"
    );

    let hooks = NoHooks.load().map_err(anyhow::Error::msg)?;

    let report = match &cli.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open events file {}", path.display()))?;
            let controller =
                RunController::new(config, JsonlEngine::new(file), hooks, stdout().lock());
            controller.run().await?
        }
        None => {
            let controller = RunController::new(
                config,
                JsonlEngine::new(tokio::io::stdin()),
                hooks,
                stdout().lock(),
            );
            controller.run().await?
        }
    };

    Ok(report)
}

/// Loads the config file, then layers CLI overrides on top.
///
/// An explicitly requested config file must exist; the default `canopy.yml`
/// is optional.
fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                RunConfig::from_file(&default)
                    .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_FILE}"))?
            } else {
                warn!("Config file {DEFAULT_CONFIG_FILE} not found, using defaults");
                RunConfig::default()
            }
        }
    };

    if let Some(directory) = &cli.directory {
        config.directory = directory.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_ms = timeout;
    }
    if let Some(pattern) = &cli.pattern {
        config.pattern = Some(pattern.clone());
    }
    if let Some(max_errors) = cli.max_errors {
        config.max_errors = max_errors;
    }
    if let Some(max_stack) = cli.max_stack {
        config.max_stack_lines = max_stack;
    }
    if cli.verbose {
        config.verbose = true;
    }
    if cli.quiet {
        config.quiet = true;
    }

    Ok(config)
}
