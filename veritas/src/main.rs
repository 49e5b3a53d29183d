#![forbid(unsafe_code)]

mod manifest;
mod report;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, IntoDiagnostic, NamedSource, WrapErr};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use veritas_ast::Program;
use veritas_core::{CheckConfig, analyze};

#[derive(Parser, Debug)]
#[command(name = "veritas", version, about = "Veritas static semantic checker")]
struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Type-check and ownership-check a serialized program
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
struct CheckArgs {
    /// Program AST as JSON
    path: PathBuf,

    /// Source text the AST spans point into
    #[arg(long)]
    source: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Human)]
    format: Format,

    /// Skip the ownership/borrow pass
    #[arg(long, default_value_t = false)]
    no_ownership: bool,

    /// Skip the effect annotation check
    #[arg(long, default_value_t = false)]
    no_effects: bool,

    /// Report at most N errors per pass (0 = all). Overrides `veritas.toml`.
    #[arg(long)]
    max_errors: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Format {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Error, Diagnostic)]
#[error("check failed: {summary}")]
#[diagnostic(code(veritas::check))]
struct CheckFailed {
    summary: String,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

/// `veritas.toml` values, then command-line flags on top.
fn resolve_config(args: &CheckArgs, mut cfg: CheckConfig) -> CheckConfig {
    if args.no_ownership {
        cfg.ownership = false;
    }
    if args.no_effects {
        cfg.effects = false;
    }
    if let Some(max) = args.max_errors {
        cfg.max_errors = max;
    }
    cfg
}

fn load_program(path: &Path) -> miette::Result<Program> {
    let raw = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", display_path(path)))?;
    let mut program: Program = serde_json::from_str(&raw)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse {}", display_path(path)))?;
    program.renumber();
    Ok(program)
}

fn check(args: CheckArgs) -> miette::Result<()> {
    let resolved = manifest::load_resolved_manifest(&args.path).map_err(miette::Report::new)?;
    if let Some(path) = &resolved.manifest_path {
        debug!(manifest = %path.display(), "using manifest");
    }
    let cfg = resolve_config(&args, resolved.check);

    let program = load_program(&args.path)?;
    let source = match &args.source {
        Some(path) => {
            let text = fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", display_path(path)))?;
            Some(NamedSource::new(display_path(path), text))
        }
        None => None,
    };

    let mut analysis = analyze(&program, &cfg);
    cfg.limit(&mut analysis.type_errors);
    cfg.limit(&mut analysis.ownership_errors);
    info!(ok = analysis.ok(), "check finished");

    match args.format {
        Format::Json => {
            let out = report::CheckReport::new(display_path(&args.path), &analysis);
            let json = serde_json::to_string_pretty(&out).into_diagnostic()?;
            println!("{json}");
        }
        Format::Human => {
            for diagnostic in report::diagnostics(&analysis, source.as_ref()) {
                eprintln!("{diagnostic:?}");
            }
        }
    }

    if analysis.ok() {
        if args.format == Format::Human {
            println!("ok: {}", display_path(&args.path));
        }
        Ok(())
    } else {
        Err(CheckFailed {
            summary: report::summary(&analysis),
        }
        .into())
    }
}

fn display_path(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Check(args) => check(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_manifest() {
        let file = CheckConfig {
            max_errors: 10,
            track_lifetimes: true,
            ..CheckConfig::default()
        };
        let args = CheckArgs {
            no_effects: true,
            max_errors: Some(3),
            ..CheckArgs::default()
        };
        let cfg = resolve_config(&args, file);
        assert!(cfg.ownership);
        assert!(!cfg.effects);
        assert!(cfg.track_lifetimes);
        assert_eq!(cfg.max_errors, 3);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let file = CheckConfig {
            ownership: false,
            max_errors: 4,
            ..CheckConfig::default()
        };
        let cfg = resolve_config(&CheckArgs::default(), file.clone());
        assert_eq!(cfg, file);
    }

    #[test]
    fn command_line_parses() {
        let cli = Cli::try_parse_from([
            "veritas",
            "check",
            "prog.json",
            "--format",
            "json",
            "--no-ownership",
            "--max-errors",
            "2",
            "-v",
        ])
        .expect("parse");
        assert!(cli.verbose);
        let Cmd::Check(args) = cli.cmd;
        assert_eq!(args.path, PathBuf::from("prog.json"));
        assert_eq!(args.format, Format::Json);
        assert!(args.no_ownership);
        assert!(!args.no_effects);
        assert_eq!(args.max_errors, Some(2));
    }
}
