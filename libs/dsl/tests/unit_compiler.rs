//! End-to-end tests of the compile pipeline

use metrum_dsl::{
    compile, compile_file, BinaryOperation, CompileOptions, Compilation, Error, Model, Numeral,
    NumericKind, Operand, Operator, Stage,
};

fn compile_text(text: &str) -> Compilation {
    compile(text, &CompileOptions::default()).unwrap()
}

fn compiled(text: &str) -> Model {
    let compilation = compile_text(text);
    assert!(
        compilation.is_success(),
        "unexpected diagnostics:\n{}",
        compilation.diagnostics
    );
    compilation.model
}

fn messages(compilation: &Compilation) -> Vec<String> {
    compilation
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn operation(model: &Model, lhs: &str, operator: Operator, rhs: &str, result: &str) -> BinaryOperation {
    BinaryOperation {
        operator,
        lhs: Operand::Unit(model.find_unit(lhs).unwrap()),
        rhs: Operand::Unit(model.find_unit(rhs).unwrap()),
        result: Operand::Unit(model.find_unit(result).unwrap()),
    }
}

#[test]
fn test_velocity_operation() {
    let compilation = compile_text(
        r#"Unit Meter "m" = <L>; Unit Second "s" = <T>; Unit Meter_Sec "m/s" = Meter / Second;"#,
    );
    assert!(compilation.diagnostics.is_empty());

    let model = compilation.model;
    assert_eq!(model.units.len(), 3);
    let mut families: Vec<_> = model.units.iter().map(|u| u.family.unwrap()).collect();
    families.dedup();
    assert_eq!(families.len(), 3);

    let velocity = operation(&model, "Meter", Operator::Quotient, "Second", "Meter_Sec");
    assert!(model.operations.contains(&velocity));

    let meter_sec = model.unit(model.find_unit("Meter_Sec").unwrap());
    assert_eq!(meter_sec.dimension.code, "Meter::DIMENSION / Second::DIMENSION");
    assert_eq!(meter_sec.factor.code, "Meter::FACTOR / Second::FACTOR");
    assert!(model
        .operations_of(model.find_unit("Meter").unwrap())
        .any(|op| *op == velocity));
}

#[test]
fn test_malformed_numeral_does_not_stop_the_pipeline() {
    let compilation = compile_text(r#"Unit Bad "x" = 1.;"#);
    assert_eq!(compilation.diagnostics.len(), 1);
    let diagnostic = compilation.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.stage, Stage::Lex);
    assert_eq!(diagnostic.span.map(|s| s.column), Some(16));
    assert!(compilation.model.units.is_empty());
}

#[test]
fn test_same_dimension_shares_family() {
    let model = compiled(r#"Unit Meter "m" = <L>; Unit Foot "ft" = 0.3048 * <L>;"#);
    let meter = model.find_unit("Meter").unwrap();
    let foot = model.unit(model.find_unit("Foot").unwrap());

    assert_eq!(model.unit(meter).family, foot.family);
    assert!(model.unit(meter).is_prime());
    assert_eq!(foot.prime, Some(meter));
    assert_eq!(model.unit(meter).relatives, vec![model.find_unit("Foot").unwrap()]);
    assert_eq!(
        foot.relative_factor.as_ref().map(|f| f.value),
        Some(Numeral::Double(0.3048))
    );
}

#[test]
fn test_missing_combination_is_not_an_error() {
    let compilation = compile_text(r#"Unit Meter "m" = <L>; Unit Second "s" = <T>;"#);
    assert!(compilation.diagnostics.is_empty());
    assert!(compilation
        .model
        .operations
        .iter()
        .all(|op| op.operator != Operator::Product));
}

#[test]
fn test_forward_references() {
    let model = compiled(
        r#"
        unit Knot "kn" = NauticalMile / Hour;
        unit NauticalMile "nmi" = 1852 * Meter;
        unit Hour "h" = 3600 * Second;
        unit Meter "m" = <L>;
        unit Second "s" = <T>;
        "#,
    );
    let knot = model.unit(model.find_unit("Knot").unwrap());
    assert!(knot.factor.value.approx_eq(&Numeral::Double(1852.0 / 3600.0), 1e-12));
    // declaration order decides the prime, not elaboration order
    assert_eq!(model.unit(model.find_unit("NauticalMile").unwrap()).prime, None);
}

#[test]
fn test_cycles_and_unknown_names() {
    let compilation = compile_text(
        r#"
        unit A "a" = B * <L>;
        unit B "b" = A;
        unit C "c" = Missing;
        "#,
    );
    assert_eq!(
        messages(&compilation),
        vec![
            "Unresolved reference 'Missing'".to_string(),
            "Unresolved reference 'B'".to_string(),
            "Unresolved reference 'A'".to_string(),
        ]
    );
    assert!(compilation.model.units.iter().all(|u| !u.valid));
    assert!(compilation.model.operations.is_empty());
}

#[test]
fn test_invalid_reference_carries_cause() {
    let compilation = compile_text(
        r#"
        unit Mile "mi" = Furlong * 8;
        unit League "lea" = 3 * Mile;
        "#,
    );
    let diagnostics: Vec<_> = compilation.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[1].message, "Unit 'League' references invalid unit 'Mile'");
    assert_eq!(
        diagnostics[1].cause.as_ref().map(|c| c.message.as_str()),
        Some("Unresolved reference 'Furlong'")
    );
    // invalid declarations stay in the model
    assert_eq!(compilation.model.units.len(), 2);
}

#[test]
fn test_duplicates() {
    let compilation = compile_text(
        r#"
        unit Meter "m" = <L>;
        unit Meter "M" = <L>;
        unit Metre "m" = <L>;
        scale Meter = 0 from Metre;
        "#,
    );
    assert_eq!(
        messages(&compilation),
        vec![
            "Duplicate unit 'Meter'".to_string(),
            "Symbol \"m\" is already used by unit 'Meter'".to_string(),
            "Name 'Meter' is already used by a unit".to_string(),
        ]
    );
}

#[test]
fn test_failed_scale_still_claims_its_name() {
    let compilation = compile_text(
        r#"
        unit Kelvin "K" = <Temperature>;
        scale TempC AbsoluteZero = 273.15 from Missing;
        scale TempC AbsoluteZero = 273.15 from Kelvin;
        "#,
    );
    assert_eq!(
        messages(&compilation),
        vec![
            "Unresolved reference 'Missing'".to_string(),
            "Duplicate scale 'TempC'".to_string(),
        ]
    );
    assert!(compilation.model.scales.iter().all(|s| !s.valid));
}

#[test]
fn test_numeric_kinds() {
    let compilation = compile_text(
        r#"
        unit <float> Meter "m" = <L>;
        unit <float> Centimeter "cm" = Meter / 100;
        unit Inch "in" = 0.0254 * Meter;
        "#,
    );
    assert_eq!(
        messages(&compilation),
        vec!["Unit 'Meter' is float, expected double".to_string()]
    );
    let centimeter = compilation.model.unit(compilation.model.find_unit("Centimeter").unwrap());
    assert_eq!(centimeter.kind, NumericKind::Float);
    assert_eq!(centimeter.factor.value, Numeral::Float(0.01));
}

#[test]
fn test_symbolic_factor() {
    let model = compiled(
        r#"
        unit <decimal> Dollar "$" = "Rate" * <Money>;
        unit <decimal> Cent "¢" = Dollar / 100;
        "#,
    );
    let cent = model.unit(model.find_unit("Cent").unwrap());
    assert!(!cent.factor.is_true_constant);
    assert_eq!(cent.factor.code, "Dollar::FACTOR / Decimal::from_parts(100, 0, 0, false, 0)");
}

#[test]
fn test_semantic_errors() {
    let cases = [
        (r#"unit Meter "m" = <L>; unit Bad "b" = Meter / 0;"#, "Division by zero"),
        (r#"unit Bad "b" = 0 * <L>;"#, "Unit 'Bad' has a zero conversion factor"),
        (
            r#"unit Meter "m" = <L>; unit Bad "b" = Meter | <T>;"#,
            "Alternative definition of 'Bad' has dimension <T>, expected <L>",
        ),
        (
            r#"unit Meter "m" = <L>; unit Bad "b" = Meter | 2 * Meter;"#,
            "Alternative definition of 'Bad' has factor 2, expected 1",
        ),
        (r#"scale S = 0 from Nowhere;"#, "Unresolved reference 'Nowhere'"),
    ];
    for (input, expected) in cases {
        let compilation = compile_text(input);
        assert_eq!(messages(&compilation), vec![expected.to_string()], "{}", input);
    }
}

#[test]
fn test_alternatives_that_agree() {
    let model = compiled(
        r#"
        unit Decimeter "dm" = <L> / 10;
        unit Liter "l" = Decimeter * Decimeter * Decimeter | <L> * <L> * <L> / 1000;
        "#,
    );
    assert!(model.unit(model.find_unit("Liter").unwrap()).valid);
}

#[test]
fn test_compile_file() {
    let missing = compile_file("/definitely/not/here.def", &CompileOptions::default());
    assert!(matches!(missing, Err(Error::Io(_))));

    let path = std::env::temp_dir().join(format!("metrum-compile-{}.def", std::process::id()));
    std::fs::write(&path, "unit Meter \"m\" = <L>;\nunit Bad \"b\" = ;\n").unwrap();
    let compilation = compile_file(&path, &CompileOptions::default()).unwrap();
    std::fs::remove_file(&path).unwrap();

    let diagnostic = compilation.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.source.as_deref(), Some(path.display().to_string().as_str()));
    assert_eq!(diagnostic.span.map(|s| s.line), Some(2));
}
