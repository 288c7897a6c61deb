//! Unit tests for the definitions parser

use metrum_dsl::ast::AstNode;
use metrum_dsl::dimension::Magnitude;
use metrum_dsl::numeral::NumericKind;
use metrum_dsl::parser::{parse, ParseOutput};
use metrum_dsl::Stage;

/// Helper to parse input that must be free of errors
fn parse_clean(input: &str) -> ParseOutput {
    let output = parse(input);
    assert!(
        !output.diagnostics.has_errors(),
        "unexpected diagnostics:\n{}",
        output.diagnostics
    );
    output
}

fn messages(output: &ParseOutput) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn test_parse_units() {
    let output = parse_clean(
        r#"
        Unit Meter "m" "metre" = <L>;
        Unit Second "s" = <Time>;
        Unit Meter_Sec "m/s" = Meter / Second;
        "#,
    );
    assert_eq!(output.units.len(), 3);
    assert_eq!(output.units[0].tags, vec!["m", "metre"]);
    assert_eq!(
        output.units[1].definition,
        AstNode::Magnitude {
            magnitude: Some(Magnitude::Time),
            span: output.units[1].definition.span(),
        }
    );
    assert_eq!(output.units[2].definition.references(), vec!["Meter", "Second"]);
}

#[test]
fn test_magnitude_aliases() {
    let output = parse_clean(
        r#"
        unit A "a" = <Length> * <T> * <M> * <Θ> * <I> * <N> * <J> * <Currency> * <X>;
        unit B "b" = <>;
        "#,
    );
    assert_eq!(output.units.len(), 2);
    assert!(matches!(
        output.units[1].definition,
        AstNode::Magnitude { magnitude: None, .. }
    ));
}

#[test]
fn test_numbers_and_literals_in_definitions() {
    let output = parse_clean(
        r#"
        unit Centimeter "cm" = Meter / 100;
        unit Radian "rad" = <> / (2 * pi);
        unit <decimal> Dollar "$" = "Rate" * <Money>;
        "#,
    );
    assert_eq!(output.units[0].definition.to_string(), "Meter / 100");
    assert_eq!(output.units[1].definition.to_string(), "<> / (2 * \"pi\")");
    assert_eq!(output.units[2].numeric_kind, Some(NumericKind::Decimal));
}

#[test]
fn test_override_marker_makes_a_reference() {
    let output = parse_clean(r#"unit Thing "t" = @pi * <L>;"#);
    assert_eq!(output.units[0].definition.references(), vec!["pi"]);
}

#[test]
fn test_format_and_alternatives() {
    let output = parse_clean(
        r#"unit Liter "l" "L" : "{0}{1}" = Decimeter * Decimeter * Decimeter | <L> * <L> * <L> / 1000;"#,
    );
    let liter = &output.units[0];
    assert_eq!(liter.format.as_deref(), Some("{0}{1}"));
    assert_eq!(liter.alternatives.len(), 1);
}

#[test]
fn test_scale_forms() {
    let output = parse_clean(
        r#"
        scale TempK AbsoluteZero = 0 from Kelvin;
        scale TempC : "{0} °C" AbsoluteZero = DegC 273.15;
        scale Shifted = -Kelvin.Factor * 2 from Kelvin;
        scale Offset @Zero = pi from Radian;
        "#,
    );
    assert_eq!(output.scales.len(), 4);

    let celsius = &output.scales[1];
    assert_eq!(celsius.unit, "DegC");
    assert_eq!(celsius.ref_point.as_deref(), Some("AbsoluteZero"));
    assert_eq!(celsius.format.as_deref(), Some("{0} °C"));
    assert_eq!(celsius.offset.to_string(), "273.15");

    let shifted = &output.scales[2];
    assert_eq!(shifted.ref_point, None);
    assert_eq!(shifted.unit, "Kelvin");
    assert_eq!(shifted.offset.to_string(), "-Kelvin * 2");

    assert_eq!(output.scales[3].ref_point.as_deref(), Some("Zero"));
}

#[test]
fn test_numeral_precedence() {
    let output = parse_clean("scale S = 1 + 2 * 3 - -4 / 2 from U;");
    match &output.scales[0].offset {
        AstNode::Difference { lhs, rhs } => {
            assert!(matches!(**lhs, AstNode::Sum { .. }));
            assert!(matches!(**rhs, AstNode::Quotient { .. }));
        }
        other => panic!("expected a difference, got {:?}", other),
    }
}

#[test]
fn test_malformed_numeral_is_single_diagnostic() {
    let output = parse(r#"Unit Bad "x" = 1.;"#);
    assert!(output.units.is_empty());
    assert_eq!(output.diagnostics.len(), 1);

    let diagnostic = output.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.stage, Stage::Lex);
    let span = diagnostic.span.unwrap();
    assert_eq!((span.line, span.column), (1, 16));
    assert_eq!(span.end_column, 17);
}

#[test]
fn test_recovery_reports_every_declaration() {
    let output = parse(
        r#"
        unit A = <L>;
        unit B "b" = <Nope>;
        unit C "c" = <T>
        unit D "d" = C * C;
        "#,
    );
    assert_eq!(output.units.len(), 1);
    assert_eq!(output.units[0].name, "D");
    assert_eq!(
        messages(&output),
        vec![
            "Expected symbol tag (string literal), found '='".to_string(),
            "Unknown magnitude 'Nope'".to_string(),
            "Expected ';', found identifier 'unit'".to_string(),
        ]
    );
}

#[test]
fn test_declaration_errors() {
    let cases = [
        (r#"unit <int> A "a" = <L>;"#, "Unknown numeric type 'int'"),
        (r#"unit A "a" = <L> ^ 2;"#, "Exponentiation '^' is not supported"),
        (r#"scale S = Kelvin.Offset from Kelvin;"#, "Unknown unit property 'Offset'"),
        (r#"scale S = 1 Kelvin;"#, "Expected 'from'"),
        ("Meter;", "Expected 'unit' or 'scale'"),
    ];
    for (input, expected) in cases {
        let output = parse(input);
        let messages = messages(&output);
        assert_eq!(messages.len(), 1, "{}: {:?}", input, messages);
        assert!(
            messages[0].starts_with(expected),
            "{}: {:?}",
            input,
            messages
        );
    }
}
