//! Rust code generator for unit definitions

mod operations;
mod scales;
mod units;

use crate::generators::{Generator, GeneratorConfig};
use crate::view::{ModelView, OperationView, ScaleView, UnitView};
use anyhow::{bail, Context, Result};
use heck::ToSnakeCase;
use metrum_dsl::{Magnitude, Numeral, NumericKind};
use std::collections::BTreeMap;

/// Output of the Rust generator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBundle {
    /// Generated module name
    pub module: String,
    /// Generated files indexed by file name, `mod.rs` included
    pub files: BTreeMap<String, String>,
}

impl SourceBundle {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Single-file rendition with every submodule inlined.
    pub fn merged(&self) -> String {
        let mut code = String::new();
        let Some(root) = self.files.get("mod.rs") else {
            return code;
        };

        code.push_str(&format!("pub mod {} {{\n", rust_ident(&self.module)));
        for line in root.lines() {
            let inlined = line
                .strip_prefix("pub mod ")
                .and_then(|rest| rest.strip_suffix(';'))
                .and_then(|name| {
                    let file = format!("{}.rs", name.trim_start_matches("r#"));
                    self.files.get(&file).map(|body| (name, body))
                });
            match inlined {
                Some((name, body)) => {
                    code.push_str(&format!("    pub mod {} {{\n", name));
                    push_indented(&mut code, body, "        ");
                    code.push_str("    }\n");
                }
                None => push_indented(&mut code, line, "    "),
            }
        }
        code.push_str("}\n");
        code
    }
}

fn push_indented(code: &mut String, text: &str, indent: &str) {
    for line in text.lines() {
        if !line.is_empty() {
            code.push_str(indent);
            code.push_str(line);
        }
        code.push('\n');
    }
}

/// Rust code generator
pub struct RustGenerator {
    config: GeneratorConfig,
}

impl RustGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn new_default() -> Self {
        Self::new(GeneratorConfig::default())
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl Generator for RustGenerator {
    type Output = SourceBundle;

    fn generate(&self, view: &ModelView) -> Result<Self::Output> {
        let mut files = BTreeMap::new();
        let units: Vec<&UnitView> = view.units.iter().filter(|u| u.valid).collect();
        let scales: Vec<&ScaleView> = view.scales.iter().filter(|s| s.valid).collect();

        let mut insert = |stem: String, code: String| -> Result<()> {
            let file = format!("{}.rs", stem);
            if files.insert(file.clone(), code).is_some() {
                bail!("Two generated modules map to '{}'", file);
            }
            Ok(())
        };

        insert("dimension".to_string(), self.generate_dimension_module())?;

        for unit in &units {
            let code = units::generate_unit(unit, view, &self.config)
                .with_context(|| format!("Failed to generate unit '{}'", unit.name))?;
            insert(module_name(&unit.name), code)?;
        }

        for scale in &scales {
            let code = scales::generate_scale(scale, view, &self.config)
                .with_context(|| format!("Failed to generate scale '{}'", scale.name))?;
            insert(module_name(&scale.name), code)?;
        }

        let free: Vec<&OperationView> = view
            .operations
            .iter()
            .filter(|op| operations::host(op, view).is_none())
            .collect();
        let has_free = !free.is_empty();
        if has_free {
            let code = operations::generate_free_functions(&free, view, &self.config)?;
            insert("operations".to_string(), code)?;
        }

        let mod_rs = self.generate_mod_rs(&units, &scales, has_free)?;
        files.insert("mod.rs".to_string(), mod_rs);

        tracing::debug!(
            module = %self.config.module_name,
            units = units.len(),
            scales = scales.len(),
            files = files.len(),
            "Generated Rust sources"
        );
        Ok(SourceBundle {
            module: self.config.module_name.clone(),
            files,
        })
    }
}

impl RustGenerator {
    /// Generate the `Dimension` type every unit module refers to
    fn generate_dimension_module(&self) -> String {
        let mut code = String::new();
        code.push_str("//! Dimension vectors\n\n");
        if self.config.generate_serde {
            code.push_str("use serde::{Deserialize, Serialize};\n\n");
        }

        let names: Vec<String> = Magnitude::ALL.iter().map(|m| m.to_string()).collect();
        if self.config.generate_docs {
            code.push_str(&format!("/// Exponents over {}\n", names.join(", ")));
        }
        code.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default");
        if self.config.generate_serde {
            code.push_str(", Serialize, Deserialize");
        }
        code.push_str(")]\n");
        code.push_str(&format!(
            "pub struct Dimension(pub [i8; {}]);\n\n",
            Magnitude::ALL.len()
        ));

        code.push_str("impl Dimension {\n");
        code.push_str(&format!(
            "    pub const NONE: Self = Self([0; {}]);\n",
            Magnitude::ALL.len()
        ));
        for magnitude in Magnitude::ALL {
            code.push_str(&format!(
                "    pub const {}: Self = Self::basic({});\n",
                magnitude.constant_name(),
                magnitude.index()
            ));
        }
        code.push_str(&format!(
            "\n    const SYMBOLS: [&'static str; {}] = [{}];\n",
            Magnitude::ALL.len(),
            Magnitude::ALL
                .iter()
                .map(|m| format!("{:?}", m.symbol()))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        code.push_str(&format!(
            r#"
    pub const fn new(exponents: [i8; {count}]) -> Self {{
        Self(exponents)
    }}

    const fn basic(index: usize) -> Self {{
        let mut exponents = [0; {count}];
        exponents[index] = 1;
        Self(exponents)
    }}

    pub fn is_dimensionless(&self) -> bool {{
        self.0.iter().all(|e| *e == 0)
    }}
}}

impl std::ops::Mul for Dimension {{
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {{
        let mut exponents = self.0;
        for (e, r) in exponents.iter_mut().zip(rhs.0) {{
            *e += r;
        }}
        Self(exponents)
    }}
}}

impl std::ops::Div for Dimension {{
    type Output = Self;

    fn div(self, rhs: Self) -> Self {{
        let mut exponents = self.0;
        for (e, r) in exponents.iter_mut().zip(rhs.0) {{
            *e -= r;
        }}
        Self(exponents)
    }}
}}

impl std::fmt::Display for Dimension {{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{
        let parts: Vec<String> = self
            .0
            .iter()
            .zip(Self::SYMBOLS)
            .filter(|(e, _)| **e != 0)
            .map(|(e, s)| if *e == 1 {{ s.to_string() }} else {{ format!("{{}}^{{}}", s, e) }})
            .collect();
        write!(f, "<{{}}>", parts.join(" "))
    }}
}}
"#,
            count = Magnitude::ALL.len()
        ));
        code
    }

    /// Generate mod.rs with the module tree and the catalog tables
    fn generate_mod_rs(
        &self,
        units: &[&UnitView],
        scales: &[&ScaleView],
        has_free: bool,
    ) -> Result<String> {
        let mut code = String::new();

        code.push_str(&format!(
            "//! Generated units of measurement: {}\n//!\n//! Do not edit by hand.\n\n",
            self.config.module_name
        ));
        code.push_str("#![allow(non_camel_case_types)]\n");
        code.push_str("#![allow(clippy::excessive_precision)]\n\n");

        if units.iter().any(|u| u.kind == NumericKind::Decimal) {
            code.push_str("pub use rust_decimal::Decimal;\n\n");
        }

        code.push_str("pub mod dimension;\n");
        for unit in units {
            code.push_str(&format!("pub mod {};\n", rust_ident(&module_name(&unit.name))));
        }
        for scale in scales {
            code.push_str(&format!("pub mod {};\n", rust_ident(&module_name(&scale.name))));
        }
        if has_free {
            code.push_str("pub mod operations;\n");
        }
        code.push('\n');

        code.push_str("pub use dimension::Dimension;\n");
        for name in units.iter().map(|u| &u.name).chain(scales.iter().map(|s| &s.name)) {
            code.push_str(&format!(
                "pub use {}::{};\n",
                rust_ident(&module_name(name)),
                rust_ident(name)
            ));
        }
        if has_free {
            code.push_str("pub use operations::*;\n");
        }
        code.push('\n');

        code.push_str(CATALOG_TYPES);

        code.push_str("\npub const UNITS: &[UnitEntry] = &[\n");
        for unit in units {
            let ty = rust_ident(&unit.name);
            code.push_str(&format!(
                "    UnitEntry {{ name: {ty}::NAME, symbols: {ty}::SYMBOLS, family: {ty}::FAMILY, dimension: {ty}::DIMENSION, factor: {} }},\n",
                Numeral::Double(unit.factor.value.to_f64()).literal()
            ));
        }
        code.push_str("];\n");

        code.push_str("\npub const SCALES: &[ScaleEntry] = &[\n");
        for scale in scales {
            let ty = rust_ident(&scale.name);
            let unit = scale
                .unit
                .as_deref()
                .with_context(|| format!("Scale '{}' has no unit", scale.name))?;
            code.push_str(&format!(
                "    ScaleEntry {{ name: {ty}::NAME, unit: {:?}, ref_point: {ty}::REF_POINT, family: {ty}::FAMILY, offset: {} }},\n",
                unit,
                Numeral::Double(scale.offset.value.to_f64()).literal()
            ));
        }
        code.push_str("];\n");

        code.push_str(CATALOG_LOOKUPS);
        Ok(code)
    }
}

const CATALOG_TYPES: &str = r#"/// Catalog entry of a generated unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitEntry {
    pub name: &'static str,
    pub symbols: &'static [&'static str],
    pub family: u32,
    pub dimension: Dimension,
    pub factor: f64,
}

/// Catalog entry of a generated scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleEntry {
    pub name: &'static str,
    pub unit: &'static str,
    pub ref_point: &'static str,
    pub family: u32,
    pub offset: f64,
}
"#;

const CATALOG_LOOKUPS: &str = r#"
pub fn find_unit(name: &str) -> Option<&'static UnitEntry> {
    UNITS.iter().find(|u| u.name == name)
}

pub fn find_unit_by_symbol(symbol: &str) -> Option<&'static UnitEntry> {
    UNITS.iter().find(|u| u.symbols.contains(&symbol))
}

pub fn units_in_family(family: u32) -> impl Iterator<Item = &'static UnitEntry> {
    UNITS.iter().filter(move |u| u.family == family)
}

pub fn scales_in_family(family: u32) -> impl Iterator<Item = &'static ScaleEntry> {
    SCALES.iter().filter(move |s| s.family == family)
}
"#;

/// Convert a type name to a module name (snake_case)
fn module_name(type_name: &str) -> String {
    type_name.to_snake_case()
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Escape identifiers that collide with Rust keywords.
pub(crate) fn rust_ident(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Type path of a unit as seen from the generated module.
pub(crate) fn unit_path(unit: &UnitView, view: &ModelView) -> String {
    let external = view.externals.iter().any(|u| std::ptr::eq(u, unit));
    match &unit.module {
        Some(module) if external => format!("{}::{}", module, rust_ident(&unit.name)),
        _ => rust_ident(&unit.name),
    }
}

/// Derives shared by unit and scale newtypes
pub(crate) fn derives(config: &GeneratorConfig) -> String {
    let mut code = String::from("#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default");
    if config.generate_serde {
        code.push_str(", Serialize, Deserialize");
    }
    code.push_str(")]\n");
    if config.generate_serde {
        code.push_str("#[serde(transparent)]\n");
    }
    code
}

/// Header and imports shared by unit and scale files
pub(crate) fn file_header(title: &str, config: &GeneratorConfig) -> String {
    let mut code = format!("//! {}\n\n", title);
    if config.generate_serde {
        code.push_str("use serde::{Deserialize, Serialize};\n");
    }
    code.push_str("#[allow(unused_imports)]\nuse super::*;\n\n");
    code
}
