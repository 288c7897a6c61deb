//! Newtype generation for units

use super::operations;
use super::{derives, file_header, rust_ident, unit_path};
use crate::generators::GeneratorConfig;
use crate::view::{ModelView, UnitView};
use anyhow::{Context, Result};

/// Generate the module of one unit: the newtype, its constants, the
/// arithmetic on its own values, relative conversions and the outer
/// operations hosted by this unit.
pub fn generate_unit(unit: &UnitView, view: &ModelView, config: &GeneratorConfig) -> Result<String> {
    let ty = rust_ident(&unit.name);
    let num = &unit.numeric_type;
    let family = unit
        .family
        .with_context(|| format!("Unit '{}' has no family", unit.name))?;

    let mut code = file_header(&format!("{} unit", unit.name), config);

    if config.generate_docs {
        code.push_str(&format!("/// {} (`{}`)\n///\n", unit.name, unit.symbol()));
        code.push_str(&format!(
            "/// Dimension {}, family {}\n",
            unit.dimension.value, family
        ));
        match &unit.prime {
            Some(prime) => code.push_str(&format!("/// Relative of `{}`\n", prime)),
            None => code.push_str("/// Prime of its family\n"),
        }
    }
    code.push_str(&derives(config));
    code.push_str(&format!("pub struct {}(pub {});\n\n", ty, num));

    code.push_str(&format!("impl {} {{\n", ty));
    code.push_str(&format!("    pub const NAME: &'static str = {:?};\n", unit.name));
    code.push_str(&format!(
        "    pub const SYMBOL: &'static str = {:?};\n",
        unit.symbol()
    ));
    code.push_str(&format!(
        "    pub const SYMBOLS: &'static [&'static str] = &[{}];\n",
        unit.tags
            .iter()
            .map(|t| format!("{:?}", t))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    code.push_str(&format!(
        "    pub const FORMAT: &'static str = {:?};\n",
        unit.format
    ));
    code.push_str(&format!("    pub const FAMILY: u32 = {};\n", family));
    if config.generate_docs {
        code.push_str(&format!("    /// `{}`\n", unit.dimension.code));
    }
    code.push_str(&format!(
        "    pub const DIMENSION: Dimension = Dimension::new({:?});\n",
        unit.dimension.value.exponents()
    ));
    if config.generate_docs {
        if unit.factor.is_true_constant {
            code.push_str(&format!("    /// `{}`\n", unit.factor.code));
        } else {
            code.push_str(&format!(
                "    /// Placeholder for the symbolic factor `{}`\n",
                unit.factor.code
            ));
        }
    }
    code.push_str(&format!(
        "    pub const FACTOR: {} = {};\n",
        num,
        unit.factor.value.literal()
    ));
    code.push_str(&format!("    pub const ONE: Self = Self({});\n", unit.one));
    code.push_str(&format!("    pub const ZERO: Self = Self({});\n", unit.zero));
    code.push_str(&format!(
        r#"
    pub const fn new(value: {num}) -> Self {{
        Self(value)
    }}

    pub fn value(self) -> {num} {{
        self.0
    }}
}}
"#
    ));

    code.push_str(&generate_display(&ty));
    code.push_str(&generate_arithmetic(&ty, num));

    for name in &unit.relatives {
        let Some(relative) = view.unit(name) else {
            continue;
        };
        if relative.kind != unit.kind {
            continue;
        }
        let path = unit_path(relative, view);
        code.push_str(&generate_from(&ty, &path));
        if !view.is_emitted(&relative.name) {
            code.push_str(&generate_from(&path, &ty));
        }
    }

    for op in view
        .operations
        .iter()
        .filter(|op| operations::host(op, view) == Some(unit.name.as_str()))
    {
        code.push('\n');
        code.push_str(
            &operations::generate_impl(op, view)
                .with_context(|| format!("Failed to generate operation {}", op))?,
        );
    }

    Ok(code)
}

fn generate_display(ty: &str) -> String {
    format!(
        r#"
impl std::fmt::Display for {ty} {{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{
        let text = Self::FORMAT
            .replace("{{0}}", &self.0.to_string())
            .replace("{{1}}", Self::SYMBOL);
        f.write_str(&text)
    }}
}}
"#
    )
}

fn generate_arithmetic(ty: &str, num: &str) -> String {
    format!(
        r#"
impl std::ops::Add for {ty} {{
    type Output = Self;

    fn add(self, rhs: Self) -> Self {{
        Self(self.0 + rhs.0)
    }}
}}

impl std::ops::Sub for {ty} {{
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {{
        Self(self.0 - rhs.0)
    }}
}}

impl std::ops::Neg for {ty} {{
    type Output = Self;

    fn neg(self) -> Self {{
        Self(-self.0)
    }}
}}

impl std::ops::Mul<{num}> for {ty} {{
    type Output = Self;

    fn mul(self, rhs: {num}) -> Self {{
        Self(self.0 * rhs)
    }}
}}

impl std::ops::Mul<{ty}> for {num} {{
    type Output = {ty};

    fn mul(self, rhs: {ty}) -> {ty} {{
        {ty}(self * rhs.0)
    }}
}}

impl std::ops::Div<{num}> for {ty} {{
    type Output = Self;

    fn div(self, rhs: {num}) -> Self {{
        Self(self.0 / rhs)
    }}
}}

impl std::ops::Div for {ty} {{
    type Output = {num};

    fn div(self, rhs: Self) -> {num} {{
        self.0 / rhs.0
    }}
}}
"#
    )
}

/// `impl From<source> for target` scaling by the ratio of their factors
fn generate_from(target: &str, source: &str) -> String {
    format!(
        r#"
impl From<{source}> for {target} {{
    fn from(value: {source}) -> Self {{
        {target}(value.0 * ({source}::FACTOR / {target}::FACTOR))
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use crate::generators::rust::{RustGenerator, SourceBundle};
    use crate::generators::Generator;
    use crate::view::ModelView;
    use metrum_dsl::{compile, CompileOptions};

    fn generate(text: &str) -> SourceBundle {
        let compilation = compile(text, &CompileOptions::default()).unwrap();
        assert!(compilation.is_success(), "{}", compilation.diagnostics);
        RustGenerator::new_default()
            .generate(&ModelView::full(&compilation.model))
            .unwrap()
    }

    #[test]
    fn test_unit_constants() {
        let bundle = generate(
            r#"
                unit Meter "m" "metre" : "{0}{1}" = <L>;
                unit Centimeter "cm" = Meter / 100;
            "#,
        );
        let meter = &bundle.files["meter.rs"];
        assert!(meter.contains("pub struct Meter(pub f64);"));
        assert!(meter.contains("pub const NAME: &'static str = \"Meter\";"));
        assert!(meter.contains("pub const SYMBOLS: &'static [&'static str] = &[\"m\", \"metre\"];"));
        assert!(meter.contains("pub const FORMAT: &'static str = \"{0}{1}\";"));
        assert!(meter.contains("pub const FAMILY: u32 = 0;"));
        assert!(meter.contains("pub const DIMENSION: Dimension = Dimension::new([1, 0, 0, 0, 0, 0, 0, 0, 0]);"));
        assert!(meter.contains("pub const FACTOR: f64 = 1.0f64;"));
        assert!(meter.contains("/// Prime of its family"));

        let centimeter = &bundle.files["centimeter.rs"];
        assert!(centimeter.contains("pub const FACTOR: f64 = 0.01f64;"));
        assert!(centimeter.contains("/// `Meter::FACTOR / 100.0f64`"));
        assert!(centimeter.contains("/// Relative of `Meter`"));
    }

    #[test]
    fn test_unit_arithmetic_impls() {
        let bundle = generate(r#"unit Meter "m" = <L>;"#);
        let meter = &bundle.files["meter.rs"];
        for expected in [
            "impl std::ops::Add for Meter {",
            "impl std::ops::Sub for Meter {",
            "impl std::ops::Neg for Meter {",
            "impl std::ops::Mul<f64> for Meter {",
            "impl std::ops::Mul<Meter> for f64 {",
            "impl std::ops::Div<f64> for Meter {",
            "impl std::ops::Div for Meter {",
            "impl std::fmt::Display for Meter {",
        ] {
            assert!(meter.contains(expected), "missing `{}`", expected);
        }
    }

    #[test]
    fn test_relatives_convert_both_ways() {
        let bundle = generate(
            r#"
                unit Meter "m" = <L>;
                unit Inch "in" = 0.0254 * Meter;
            "#,
        );
        assert!(bundle.files["meter.rs"].contains("impl From<Inch> for Meter {"));
        assert!(bundle.files["inch.rs"].contains("impl From<Meter> for Inch {"));
        assert!(bundle.files["inch.rs"].contains("Inch(value.0 * (Meter::FACTOR / Inch::FACTOR))"));
    }

    #[test]
    fn test_no_conversion_across_numeric_kinds() {
        let bundle = generate(
            r#"
                unit Meter "m" = <L>;
                unit<float> Foot "ft" = <L> * 0.3048;
            "#,
        );
        assert!(bundle.files["foot.rs"].contains("pub struct Foot(pub f32);"));
        assert!(!bundle.files["meter.rs"].contains("From<Foot>"));
    }

    #[test]
    fn test_serde_can_be_disabled() {
        let compilation = compile(r#"unit Meter "m" = <L>;"#, &CompileOptions::default()).unwrap();
        let config = crate::generators::GeneratorConfig {
            generate_serde: false,
            generate_docs: false,
            ..Default::default()
        };
        let bundle = RustGenerator::new(config)
            .generate(&ModelView::full(&compilation.model))
            .unwrap();
        let meter = &bundle.files["meter.rs"];
        assert!(!meter.contains("serde"));
        assert!(!meter.contains("///"));
    }
}
