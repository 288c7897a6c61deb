//! Metrum Code Generator
//!
//! Turns a resolved unit model into source code.
//!
//! ## Architecture
//!
//! The generator uses a two-stage pipeline:
//! 1. **View**: a read-only, serializable snapshot of the resolved model,
//!    either complete or restricted to the entries of a late compilation
//! 2. **Generators**: language-specific code generation from the view
//!
//! New backends only need the view, never the compiler internals.

pub mod generators;
pub mod utils;
pub mod view;

use std::path::Path;

use anyhow::{bail, Context, Result};
use generators::rust::RustGenerator;
use generators::GeneratorConfig;
use metrum_dsl::{CompileOptions, Model};
use view::ModelView;

pub use generators::rust::SourceBundle;
pub use generators::Generator;

/// Main entry point for code generation
pub struct CodeGenerator {
    view: ModelView,
}

impl CodeGenerator {
    /// Generator over every entry of the model
    pub fn from_model(model: &Model) -> Self {
        Self {
            view: ModelView::full(model),
        }
    }

    /// Generator over the late entries of the model only
    pub fn late(model: &Model) -> Self {
        Self {
            view: ModelView::late(model),
        }
    }

    pub fn view(&self) -> &ModelView {
        &self.view
    }

    /// Generate code for a specific language
    pub fn generate<G: Generator>(&self, generator: G) -> Result<G::Output> {
        generator.generate(&self.view)
    }
}

/// Convenience helper to compile a definitions file and write the Rust bundle.
///
/// Returns the number of generated files.
pub fn generate_rust_from_file(
    definitions: &Path,
    output_dir: &Path,
    options: &CompileOptions,
    config: GeneratorConfig,
) -> Result<usize> {
    let compilation = metrum_dsl::compile_file(definitions, options)
        .with_context(|| format!("compiling {}", definitions.display()))?;
    if !compilation.is_success() {
        bail!(
            "{} has {} error(s):\n{}",
            definitions.display(),
            compilation.diagnostics.error_count(),
            compilation.diagnostics
        );
    }

    let output = CodeGenerator::from_model(&compilation.model)
        .generate(RustGenerator::new(config))
        .context("running Rust generator")?;

    utils::write_modules(output_dir, &output)?;

    Ok(output.files.len())
}
