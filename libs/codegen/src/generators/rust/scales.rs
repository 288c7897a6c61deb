//! Newtype generation for scales

use super::{derives, file_header, rust_ident, unit_path};
use crate::generators::GeneratorConfig;
use crate::view::{ModelView, ScaleView};
use anyhow::{Context, Result};

/// Generate the module of one scale.
///
/// A scale value `s` sits `s + OFFSET` units above the family's reference
/// point. Conversions go through that level, so relatives with different
/// offsets and units convert exactly.
pub fn generate_scale(scale: &ScaleView, view: &ModelView, config: &GeneratorConfig) -> Result<String> {
    let ty = rust_ident(&scale.name);
    let unit_name = scale
        .unit
        .as_deref()
        .with_context(|| format!("Scale '{}' has no unit", scale.name))?;
    let unit = view
        .unit(unit_name)
        .with_context(|| format!("Unknown unit '{}'", unit_name))?;
    let unit_ty = unit_path(unit, view);
    let num = &unit.numeric_type;
    let family = scale
        .family
        .with_context(|| format!("Scale '{}' has no family", scale.name))?;

    let mut code = file_header(&format!("{} scale", scale.name), config);

    if config.generate_docs {
        code.push_str(&format!(
            "/// {} scale in `{}`\n///\n/// Reference point {}",
            scale.name, unit.name, scale.ref_point
        ));
        if scale.ref_point_normalized {
            code.push_str(" (implicit)");
        }
        code.push_str(&format!(", family {}\n", family));
    }
    code.push_str(&derives(config));
    code.push_str(&format!("pub struct {}(pub {});\n\n", ty, num));

    code.push_str(&format!("impl {} {{\n", ty));
    code.push_str(&format!("    pub const NAME: &'static str = {:?};\n", scale.name));
    code.push_str(&format!(
        "    pub const FORMAT: &'static str = {:?};\n",
        scale.format
    ));
    code.push_str(&format!(
        "    pub const REF_POINT: &'static str = {:?};\n",
        scale.ref_point
    ));
    code.push_str(&format!("    pub const FAMILY: u32 = {};\n", family));
    if config.generate_docs {
        code.push_str(&format!("    /// `{}`\n", scale.offset.code));
    }
    code.push_str(&format!(
        "    pub const OFFSET: {} = {};\n",
        num,
        scale.offset.value.literal()
    ));
    code.push_str(&format!(
        r#"
    pub const fn new(value: {num}) -> Self {{
        Self(value)
    }}

    pub fn value(self) -> {num} {{
        self.0
    }}

    /// Distance from the reference point
    pub fn level(self) -> {unit_ty} {{
        {unit_ty}(self.0 + Self::OFFSET)
    }}

    pub fn from_level(level: {unit_ty}) -> Self {{
        Self(level.0 - Self::OFFSET)
    }}
}}

impl std::fmt::Display for {ty} {{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{
        let text = Self::FORMAT
            .replace("{{0}}", &self.0.to_string())
            .replace("{{1}}", {unit_ty}::SYMBOL);
        f.write_str(&text)
    }}
}}

impl std::ops::Add<{unit_ty}> for {ty} {{
    type Output = Self;

    fn add(self, rhs: {unit_ty}) -> Self {{
        Self(self.0 + rhs.0)
    }}
}}

impl std::ops::Sub<{unit_ty}> for {ty} {{
    type Output = Self;

    fn sub(self, rhs: {unit_ty}) -> Self {{
        Self(self.0 - rhs.0)
    }}
}}

impl std::ops::Sub for {ty} {{
    type Output = {unit_ty};

    fn sub(self, rhs: Self) -> {unit_ty} {{
        {unit_ty}(self.0 - rhs.0)
    }}
}}
"#
    ));

    for name in &scale.relatives {
        // Relatives owned by other modules are not carried by the view
        let Some(relative) = view.scale(name) else {
            continue;
        };
        let Some(relative_unit) = relative.unit.as_deref().and_then(|u| view.unit(u)) else {
            continue;
        };
        if relative_unit.kind != unit.kind {
            continue;
        }
        let relative_ty = rust_ident(&relative.name);
        let level = if relative_unit.name == unit.name {
            "value.level()".to_string()
        } else {
            format!("{}::from(value.level())", unit_ty)
        };
        code.push_str(&format!(
            r#"
impl From<{relative_ty}> for {ty} {{
    fn from(value: {relative_ty}) -> Self {{
        Self::from_level({level})
    }}
}}
"#
        ));
    }

    Ok(code)
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

    const TEMPERATURES: &str = r#"
        unit Kelvin "K" = <Temperature>;
        unit DegF "°F" = Kelvin * 5 / 9;
        scale TempK AbsoluteZero = 0 from Kelvin;
        scale TempC AbsoluteZero = 273.15 from Kelvin;
        scale TempF AbsoluteZero = 459.67 from DegF;
    "#;

    #[test]
    fn test_scale_constants() {
        let bundle = generate(TEMPERATURES);
        let celsius = &bundle.files["temp_c.rs"];
        assert!(celsius.contains("pub struct TempC(pub f64);"));
        assert!(celsius.contains("pub const REF_POINT: &'static str = \"AbsoluteZero\";"));
        assert!(celsius.contains("pub const OFFSET: f64 = 273.15f64;"));
        assert!(celsius.contains("Kelvin(self.0 + Self::OFFSET)"));
        assert!(celsius.contains("impl std::ops::Sub for TempC {\n    type Output = Kelvin;"));
    }

    #[test]
    fn test_relatives_convert_through_level() {
        let bundle = generate(TEMPERATURES);
        let celsius = &bundle.files["temp_c.rs"];
        assert!(celsius.contains("impl From<TempK> for TempC {"));
        assert!(celsius.contains("Self::from_level(value.level())"));
        assert!(celsius.contains("impl From<TempF> for TempC {"));
        assert!(celsius.contains("Self::from_level(Kelvin::from(value.level()))"));
    }

    #[test]
    fn test_implicit_reference_point() {
        let bundle = generate(
            r#"
                unit Meter "m" = <L>;
                scale Altitude = 0 from Meter;
            "#,
        );
        let altitude = &bundle.files["altitude.rs"];
        assert!(altitude.contains("pub const REF_POINT: &'static str = \"<common reference point>\";"));
        assert!(altitude.contains("(implicit)"));
        assert!(!altitude.contains("impl From<"));
    }
}
