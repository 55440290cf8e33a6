//! Pipe network graph sanitizer CLI.
//!
//! Provides the `pipenet` binary. `sanitize` reads a graph document, runs
//! the same `pipenet_core::Sanitizer` pass the write path uses and prints
//! the canonical graph; `check` only reports whether the document passes.
//!
//! Options default from `PIPENET_STRICT`, `PIPENET_OFFSET_TOLERANCE_M` and
//! `PIPENET_REJECT_CYCLES`; command-line flags override them.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipenet_core::{RawGraph, SanitizeOptions, Sanitized, Sanitizer, SeededIdSource};

/// Pipe network graph tools.
#[derive(Parser)]
#[command(name = "pipenet", about = "Pipe network graph sanitizer")]
struct Cli {
    /// Log per-stage progress to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Sanitize a graph and print the canonical result.
    Sanitize {
        #[command(flatten)]
        pass: PassArgs,

        /// Write the canonical graph here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the diagnostics report as JSON to this file.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Validate a graph without printing it.
    Check {
        #[command(flatten)]
        pass: PassArgs,
    },
}

#[derive(Args)]
struct PassArgs {
    /// Graph JSON file; reads stdin when omitted or `-`.
    input: Option<PathBuf>,

    /// Reject transient UI fields instead of stripping them.
    #[arg(long)]
    strict: bool,

    /// Anchor overshoot clamped silently, in metres.
    #[arg(long, value_parser = parse_tolerance)]
    offset_tolerance: Option<f64>,

    /// Fail on flow cycles instead of reporting them.
    #[arg(long)]
    reject_cycles: bool,

    /// Seed for generated edge ids (reproducible runs).
    #[arg(long)]
    seed: Option<u64>,
}

impl PassArgs {
    fn options(&self) -> SanitizeOptions {
        let mut options = SanitizeOptions::from_env();
        options.strict |= self.strict;
        options.reject_cycles |= self.reject_cycles;
        if let Some(tolerance) = self.offset_tolerance {
            options.offset_tolerance_m = tolerance;
        }
        options
    }
}

/// Accepts finite, non-negative metre values only.
fn parse_tolerance(text: &str) -> Result<f64, String> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        Ok(value) => Err(format!("tolerance must be a finite value >= 0, got {value}")),
        Err(e) => Err(e.to_string()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Sanitize {
            pass,
            output,
            report,
        } => run_sanitize(&pass, output.as_deref(), report.as_deref()),
        Commands::Check { pass } => run_check(&pass),
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pipenet_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Execute the sanitize subcommand.
///
/// Returns exit code: 0 = success, 2 = validation failure,
/// 3 = I/O or JSON error.
fn run_sanitize(pass: &PassArgs, output: Option<&Path>, report: Option<&Path>) -> i32 {
    let sanitized = match run_pass(pass) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let graph_json = match serde_json::to_string_pretty(&sanitized.graph) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: failed to serialize graph: {}", e);
            return 3;
        }
    };
    if let Err(code) = write_output(output, &graph_json) {
        return code;
    }

    if let Some(path) = report {
        let report_json = match serde_json::to_string_pretty(&sanitized.report) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error: failed to serialize report: {}", e);
                return 3;
            }
        };
        if let Err(code) = write_output(Some(path), &report_json) {
            return code;
        }
    }

    for conflict in &sanitized.report.branch_conflicts {
        eprintln!("warning: {}", conflict);
    }
    0
}

/// Execute the check subcommand; same exit codes as `sanitize`.
fn run_check(pass: &PassArgs) -> i32 {
    match run_pass(pass) {
        Ok(sanitized) => {
            let report = &sanitized.report;
            println!(
                "ok: {} node(s), {} edge(s), {} branch(es), {} conflict(s)",
                sanitized.graph.nodes.len(),
                sanitized.graph.edges.len(),
                sanitized.graph.branches.len(),
                report.branch_conflicts.len()
            );
            0
        }
        Err(code) => code,
    }
}

/// Reads the input and runs the pass, mapping failures to exit codes.
fn run_pass(pass: &PassArgs) -> Result<Sanitized, i32> {
    let text = read_input(pass.input.as_deref()).map_err(|e| {
        eprintln!("Error: failed to read input: {}", e);
        3
    })?;
    let raw: RawGraph = serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: input is not a graph document: {}", e);
        3
    })?;

    let mut sanitizer = Sanitizer::new(pass.options());
    if let Some(seed) = pass.seed {
        sanitizer = sanitizer.with_id_source(SeededIdSource::new(seed));
    }

    sanitizer.run(&raw).map_err(|err| {
        eprintln!("Validation failed ({}): {}", err.code(), err);
        if let Ok(json) = serde_json::to_string(&err) {
            eprintln!("{}", json);
        }
        2
    })
}

fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => fs::read_to_string(p),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> Result<(), i32> {
    match path {
        Some(p) => fs::write(p, contents).map_err(|e| {
            eprintln!("Error: failed to write '{}': {}", p.display(), e);
            3
        }),
        None => {
            println!("{}", contents);
            Ok(())
        }
    }
}
