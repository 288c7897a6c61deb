//! Compilation entry points
//!
//! Orchestrates the pipeline: parse → elaborate → resolve. The late path runs
//! the same pipeline over a model pre-filled with decompiled entries.

use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::elaborate::elaborate;
use crate::error::Result;
use crate::model::Model;
use crate::numeral::NumericKind;
use crate::parser::{ParseOutput, Parser};
use crate::resolver::resolve;

/// What a late declaration reusing a compiled unit's name turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RedeclarationPolicy {
    /// A distinct unit in a brand-new family
    #[default]
    NewFamily,
    /// The compiled unit itself, when both definitions agree
    Alias,
    /// Always a diagnostic
    Reject,
}

#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Numeric kind of units declared without `<double|float|decimal>`.
    pub numeric_kind: NumericKind,
    /// Format of units declared without `: "format"`.
    pub default_format: String,
    /// Lowest family id handed to a new family.
    pub first_family: u32,
    pub redeclaration: RedeclarationPolicy,
    /// Path or name reported as the origin of diagnostics.
    pub source: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            numeric_kind: NumericKind::Double,
            default_format: "{0} {1}".to_string(),
            first_family: 0,
            redeclaration: RedeclarationPolicy::NewFamily,
            source: None,
        }
    }
}

/// Resolved model plus everything reported while building it
#[derive(Debug, Clone)]
pub struct Compilation {
    pub model: Model,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Compile definitions text into a fresh model
///
/// # Errors
///
/// Only internal invariant violations fail the call; malformed definitions
/// are reported in [`Compilation::diagnostics`].
pub fn compile(text: &str, options: &CompileOptions) -> Result<Compilation> {
    extend(Model::new(), text, options)
}

/// Read and compile a definitions file
pub fn compile_file(path: impl AsRef<Path>, options: &CompileOptions) -> Result<Compilation> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut options = options.clone();
    if options.source.is_none() {
        options.source = Some(path.display().to_string());
    }
    compile(&text, &options)
}

/// Compile late definitions on top of `model`
///
/// Entries already in `model` keep their family ids. Entries declared by
/// `text` start at [`Model::late_units`] / [`Model::late_scales`].
pub fn extend(mut model: Model, text: &str, options: &CompileOptions) -> Result<Compilation> {
    model.begin_late();

    let parser = match &options.source {
        Some(source) => Parser::with_source(text, source),
        None => Parser::new(text),
    };
    let ParseOutput {
        units,
        scales,
        mut diagnostics,
    } = parser.parse();

    elaborate(&mut model, &units, &scales, options, &mut diagnostics)?;
    resolve(&mut model, options.first_family, &mut diagnostics);

    Ok(Compilation { model, diagnostics })
}
