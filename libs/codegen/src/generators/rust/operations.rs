//! Outer operation generation
//!
//! An operation is emitted as an operator impl in the file of its left
//! operand, or of its right operand when the left one is not generated here.
//! Operations between two foreign units become free functions.

use super::rust_ident;
use crate::generators::GeneratorConfig;
use crate::view::{ModelView, OperandView, OperationView};
use anyhow::{anyhow, Context, Result};
use heck::ToSnakeCase;
use metrum_dsl::{Numeral, Operator};

fn is_generated(operand: &OperandView, view: &ModelView) -> bool {
    operand.module.is_none() && view.operand_unit(operand).is_some_and(|u| u.valid)
}

/// Unit whose file hosts the impl for `op`; `None` for a free function.
pub(super) fn host<'a>(op: &'a OperationView, view: &ModelView) -> Option<&'a str> {
    [&op.lhs, &op.rhs]
        .into_iter()
        .find(|operand| is_generated(operand, view))
        .map(|operand| operand.name.as_str())
}

fn operand_type(operand: &OperandView) -> String {
    if operand.number {
        return operand.name.clone();
    }
    match &operand.module {
        Some(module) => format!("{}::{}", module, rust_ident(&operand.name)),
        None => rust_ident(&operand.name),
    }
}

fn factor(operand: &OperandView, view: &ModelView, one: Numeral) -> Result<Numeral> {
    if operand.number {
        return Ok(one);
    }
    view.operand_unit(operand)
        .map(|unit| unit.factor.value)
        .ok_or_else(|| anyhow!("Unknown unit '{}'", operand.name))
}

/// `(lhs.factor op rhs.factor) / result.factor`, or `None` when it is one
fn ratio(op: &OperationView, view: &ModelView) -> Result<Option<Numeral>> {
    let kind = [&op.lhs, &op.rhs]
        .into_iter()
        .find_map(|operand| view.operand_unit(operand))
        .map(|unit| unit.kind)
        .ok_or_else(|| anyhow!("Operation {} has no unit operand", op))?;
    let one = kind.one();

    let lhs = factor(&op.lhs, view, one)?;
    let rhs = factor(&op.rhs, view, one)?;
    let result = factor(&op.result, view, one)?;
    let combined = match op.operator {
        Operator::Product => lhs.checked_mul(&rhs),
        Operator::Quotient => lhs.checked_div(&rhs),
    }
    .and_then(|value| value.checked_div(&result))
    .with_context(|| format!("Cannot scale the result of {}", op))?;

    Ok((!combined.approx_eq(&one, 1e-12)).then_some(combined))
}

fn value_expr(op: &OperationView, lhs: &str, rhs: &str, view: &ModelView) -> Result<String> {
    let lhs = if op.lhs.number {
        lhs.to_string()
    } else {
        format!("{}.0", lhs)
    };
    let rhs = if op.rhs.number {
        rhs.to_string()
    } else {
        format!("{}.0", rhs)
    };
    let mut value = format!("{} {} {}", lhs, op.operator.symbol(), rhs);
    if let Some(ratio) = ratio(op, view)? {
        value = format!("{} * {}", value, ratio.literal());
    }

    if op.result.number {
        Ok(value)
    } else {
        Ok(format!("{}({})", operand_type(&op.result), value))
    }
}

fn trait_of(operator: Operator) -> (&'static str, &'static str) {
    match operator {
        Operator::Product => ("Mul", "mul"),
        Operator::Quotient => ("Div", "div"),
    }
}

/// Operator impl for `op`
pub(super) fn generate_impl(op: &OperationView, view: &ModelView) -> Result<String> {
    let (trait_name, method) = trait_of(op.operator);
    let lhs = operand_type(&op.lhs);
    let rhs = operand_type(&op.rhs);
    let result = operand_type(&op.result);
    let body = value_expr(op, "self", "rhs", view)?;

    Ok(format!(
        r#"impl std::ops::{trait_name}<{rhs}> for {lhs} {{
    type Output = {result};

    fn {method}(self, rhs: {rhs}) -> {result} {{
        {body}
    }}
}}
"#
    ))
}

fn function_name(op: &OperationView) -> String {
    let (_, method) = trait_of(op.operator);
    format!(
        "{}_{}_{}",
        op.lhs.name.to_snake_case(),
        method,
        op.rhs.name.to_snake_case()
    )
}

/// Module of free functions for operations with no generated operand
pub(super) fn generate_free_functions(
    ops: &[&OperationView],
    view: &ModelView,
    config: &GeneratorConfig,
) -> Result<String> {
    let mut code = String::from("//! Operations between units of other modules\n\n");
    code.push_str("#[allow(unused_imports)]\nuse super::*;\n");

    for op in ops {
        let lhs = operand_type(&op.lhs);
        let rhs = operand_type(&op.rhs);
        let result = operand_type(&op.result);
        let body = value_expr(op, "lhs", "rhs", view)
            .with_context(|| format!("Failed to generate operation {}", op))?;

        code.push('\n');
        if config.generate_docs {
            code.push_str(&format!("/// `{}`\n", op));
        }
        code.push_str(&format!(
            "pub fn {}(lhs: {}, rhs: {}) -> {} {{\n    {}\n}}\n",
            rust_ident(&function_name(op)),
            lhs,
            rhs,
            result,
            body
        ));
    }
    Ok(code)
}
