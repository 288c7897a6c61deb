//! metrum - compile, check and generate unit definitions
//!
//! Usage:
//!   metrum check units.def
//!   metrum generate units.def -o src/units
//!   metrum dump units.def > model.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrum_codegen::generate_rust_from_file;
use metrum_codegen::view::ModelView;
use metrum_dsl::{compile_file, Compilation, CompileOptions};

mod logging;
mod settings;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "metrum")]
#[command(about = "Compiler for units-of-measurement definitions", version)]
struct Cli {
    /// Settings file (defaults to ./Metrum.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for the metrum crates (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile definitions and report diagnostics
    Check {
        file: PathBuf,
    },

    /// Generate Rust source for every unit and scale
    Generate {
        file: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Name of the generated module
        #[arg(long)]
        module_name: Option<String>,

        /// Leave out documentation comments
        #[arg(long)]
        no_docs: bool,
    },

    /// Print the resolved model as JSON
    Dump {
        file: PathBuf,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    if cli.json_logs {
        settings.logging.json = true;
    }
    logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::Check { file } => check(&file, &settings),
        Command::Generate {
            file,
            output,
            module_name,
            no_docs,
        } => {
            if let Some(name) = module_name {
                settings.generate.module_name = name;
            }
            if no_docs {
                settings.generate.docs = false;
            }
            generate(&file, &output, &settings)
        }
        Command::Dump { file, compact } => dump(&file, compact, &settings),
    }
}

fn compile(file: &Path, options: &CompileOptions) -> Result<Compilation> {
    compile_file(file, options).with_context(|| format!("Failed to read {}", file.display()))
}

fn report(compilation: &Compilation) {
    if !compilation.diagnostics.is_empty() {
        eprintln!("{}", compilation.diagnostics);
    }
}

fn check(file: &Path, settings: &Settings) -> Result<ExitCode> {
    let compilation = compile(file, &settings.compile_options())?;
    report(&compilation);

    let model = &compilation.model;
    let errors = compilation.diagnostics.error_count();
    println!(
        "{}: {} unit(s), {} scale(s), {} operation(s), {} error(s)",
        file.display(),
        model.units.len(),
        model.scales.len(),
        model.operations.len(),
        errors
    );
    Ok(if errors == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn generate(file: &Path, output: &Path, settings: &Settings) -> Result<ExitCode> {
    let count = generate_rust_from_file(
        file,
        output,
        &settings.compile_options(),
        settings.generator_config(),
    )?;
    tracing::info!(files = count, output = %output.display(), "Generated Rust module");
    println!("Wrote {} file(s) to {}", count, output.display());
    Ok(ExitCode::SUCCESS)
}

fn dump(file: &Path, compact: bool, settings: &Settings) -> Result<ExitCode> {
    let compilation = compile(file, &settings.compile_options())?;
    report(&compilation);

    // a partial model is still printed so errors can be inspected
    let view = ModelView::full(&compilation.model);
    let json = if compact {
        serde_json::to_string(&view)?
    } else {
        serde_json::to_string_pretty(&view)?
    };
    println!("{}", json);

    Ok(if compilation.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
