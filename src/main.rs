//! Jmm Compiler
//!
//! Command-line driver: reads a syntax tree serialized as JSON, reports
//! diagnostics and prints the lowered IR.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use jmmc::{check, lower, parse_ast, print_ir, CompilerOptions, Diagnostic, DiagnosticReport, Program};

/// Jmm Compiler
#[derive(Parser, Debug)]
#[command(name = "jmmc")]
#[command(version)]
#[command(about = "Jmm compiler - semantic analysis and lowering to three-address IR")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a syntax tree for semantic errors
    Check {
        /// Syntax tree (.json)
        input: PathBuf,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a syntax tree, then lower it to IR
    Lower {
        /// Syntax tree (.json)
        input: PathBuf,

        /// Propagate and fold constants before lowering
        #[arg(short = 'O')]
        optimize: bool,

        /// Treat warnings as errors
        #[arg(long)]
        deny_warnings: bool,

        /// Compiler options (.json); flags override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Check { input, json } => check_file(input, *json),
        Commands::Lower { input, optimize, deny_warnings, config, output } => {
            let options = load_options(config.as_deref(), *optimize, *deny_warnings);
            options.and_then(|options| lower_file(input, &options, output.as_deref()))
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn read_program(input: &Path) -> Result<Program> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    parse_ast(&source).with_context(|| format!("parsing syntax tree {}", input.display()))
}

fn load_options(config: Option<&Path>, optimize: bool, deny_warnings: bool) -> Result<CompilerOptions> {
    let mut options = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing options {}", path.display()))?
        }
        None => CompilerOptions::default(),
    };
    options.fold_constants |= optimize;
    options.warnings_as_errors |= deny_warnings;
    Ok(options)
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}

/// Returns whether the program is free of errors
fn check_file(input: &Path, json: bool) -> Result<bool> {
    let program = read_program(input)?;
    let checked = check(&program);

    if json {
        let summary = DiagnosticReport::new(&program.class.name, &checked.diagnostics);
        println!("{}", summary.to_json()?);
    } else {
        report(&checked.diagnostics);
    }
    Ok(!checked.diagnostics.iter().any(Diagnostic::is_error))
}

/// Returns whether lowering ran
fn lower_file(input: &Path, options: &CompilerOptions, output: Option<&Path>) -> Result<bool> {
    let program = read_program(input)?;
    let checked = check(&program);
    report(&checked.diagnostics);
    if options.blocks_lowering(&checked.diagnostics) {
        eprintln!(
            "Lowering skipped: {} blocking diagnostic(s)",
            options.blocking_count(&checked.diagnostics)
        );
        return Ok(false);
    }

    let module = lower(&program, &checked.table, options)
        .with_context(|| format!("lowering {}", program.class.name))?;
    let text = print_ir(&module);
    match output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote IR to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(true)
}
