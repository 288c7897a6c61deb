//! CLI settings
//!
//! Layered lowest to highest: built-in defaults, `Metrum.toml` (or the file
//! given with `--config`), `METRUM_*` environment variables, command line
//! flags. Nested keys use a double underscore in the environment, e.g.
//! `METRUM_COMPILE__NUMERIC_KIND=decimal`.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use metrum_codegen::generators::GeneratorConfig;
use metrum_dsl::{CompileOptions, NumericKind, RedeclarationPolicy};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "Metrum.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub compile: CompileSettings,
    pub generate: GenerateSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level for the metrum crates when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompileSettings {
    pub numeric_kind: NumericKind,
    pub default_format: String,
    pub redeclaration: RedeclarationPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerateSettings {
    pub docs: bool,
    pub serde: bool,
    pub module_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Default for CompileSettings {
    fn default() -> Self {
        let options = CompileOptions::default();
        Self {
            numeric_kind: options.numeric_kind,
            default_format: options.default_format,
            redeclaration: options.redeclaration,
        }
    }
}

impl Default for GenerateSettings {
    fn default() -> Self {
        let config = GeneratorConfig::default();
        Self {
            docs: config.generate_docs,
            serde: config.generate_serde,
            module_name: config.module_name,
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("METRUM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            numeric_kind: self.compile.numeric_kind,
            default_format: self.compile.default_format.clone(),
            redeclaration: self.compile.redeclaration,
            ..CompileOptions::default()
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            generate_docs: self.generate.docs,
            generate_serde: self.generate.serde,
            module_name: self.generate.module_name.clone(),
        }
    }
}
