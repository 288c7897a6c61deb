//! Elaboration of parsed declarations into model entries
//!
//! Units are encoded to a fixed point: each pass encodes every declaration
//! still waiting on a forward reference, until a pass makes no progress.
//! Scales are encoded afterwards against the final unit set.

use std::collections::HashMap;

use crate::ast::{AstNode, ScaleDecl, UnitDecl};
use crate::compiler::{CompileOptions, RedeclarationPolicy};
use crate::diagnostics::{Diagnostic, Diagnostics, Stage};
use crate::encoder::{
    DimensionEncoder, DimensionalExpression, EncodeError, Lookup, NumeralEncoder,
    NumeralExpression, UnitLookup, UnitSummary,
};
use crate::error::{Error, Result};
use crate::model::{Model, Origin, ScaleId, ScaleType, UnitId, UnitType};
use crate::numeral::NumericKind;
use crate::token::Span;

const FACTOR_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
enum State {
    Pending,
    Done,
    Failed(Diagnostic),
}

/// Name resolution over the units elaborated so far
struct Scope<'a> {
    model: &'a Model,
    names: &'a HashMap<String, UnitId>,
    states: &'a [State],
}

impl Scope<'_> {
    fn cause(&self, name: &str) -> Option<&Diagnostic> {
        let id = self.names.get(name)?;
        match &self.states[id.0] {
            State::Failed(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

impl UnitLookup for Scope<'_> {
    fn lookup_unit(&self, name: &str) -> Lookup<'_> {
        let Some(id) = self.names.get(name) else {
            return Lookup::Unknown;
        };
        match &self.states[id.0] {
            State::Pending => Lookup::Pending,
            State::Failed(_) => Lookup::Invalid,
            State::Done => {
                let unit = self.model.unit(*id);
                Lookup::Resolved(UnitSummary {
                    name: &unit.name,
                    kind: unit.kind,
                    dimension: &unit.dimension,
                    factor: &unit.factor,
                })
            }
        }
    }
}

struct Encoded {
    dimension: DimensionalExpression,
    factor: NumeralExpression,
}

enum Failure {
    Deferred { name: String, span: Span },
    Failed(Diagnostic),
    Internal(String),
}

fn semantic_error(message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::error(Stage::Semantic, message).with_span(span)
}

fn failure(owner: &str, fallback: Span, error: EncodeError, scope: &Scope<'_>) -> Failure {
    let span = error.span().unwrap_or(fallback);
    match error {
        EncodeError::Pending { name, span } => Failure::Deferred { name, span },
        EncodeError::Internal(message) => Failure::Internal(message),
        EncodeError::InvalidReference { ref name, .. } => {
            let mut diagnostic = semantic_error(
                format!("Unit '{}' references invalid unit '{}'", owner, name),
                span,
            );
            if let Some(cause) = scope.cause(name) {
                diagnostic = diagnostic.caused_by(cause.clone());
            }
            Failure::Failed(diagnostic)
        }
        other => Failure::Failed(semantic_error(other.to_string(), span)),
    }
}

fn encode_unit(
    decl: &UnitDecl,
    kind: NumericKind,
    scope: &Scope<'_>,
) -> std::result::Result<Encoded, Failure> {
    let encode = |node: &AstNode| {
        let dimension = DimensionEncoder::new(scope).encode(node)?;
        let factor = NumeralEncoder::new(scope, kind).encode(node)?;
        Ok::<_, EncodeError>((dimension, factor))
    };

    let (dimension, factor) =
        encode(&decl.definition).map_err(|e| failure(&decl.name, decl.span, e, scope))?;

    for alternative in &decl.alternatives {
        let (alt_dimension, alt_factor) =
            encode(alternative).map_err(|e| failure(&decl.name, decl.span, e, scope))?;
        if alt_dimension.value != dimension.value {
            return Err(Failure::Failed(semantic_error(
                format!(
                    "Alternative definition of '{}' has dimension {}, expected {}",
                    decl.name, alt_dimension.value, dimension.value
                ),
                alternative.span(),
            )));
        }
        if factor.is_true_constant
            && alt_factor.is_true_constant
            && !alt_factor.value.approx_eq(&factor.value, FACTOR_TOLERANCE)
        {
            return Err(Failure::Failed(semantic_error(
                format!(
                    "Alternative definition of '{}' has factor {}, expected {}",
                    decl.name, alt_factor.value, factor.value
                ),
                alternative.span(),
            )));
        }
    }

    if factor.is_true_constant && factor.value.is_zero() {
        return Err(Failure::Failed(semantic_error(
            format!("Unit '{}' has a zero conversion factor", decl.name),
            decl.definition.span(),
        )));
    }

    Ok(Encoded { dimension, factor })
}

fn module_of(unit: &UnitType) -> &str {
    match &unit.origin {
        Origin::Decompiled { module } => module,
        Origin::Declared { .. } => "<definitions>",
    }
}

/// Elaborate `units` and `scales` into `model`, after any decompiled entries
/// it already holds. Recoverable problems are reported to `diagnostics`.
pub(crate) fn elaborate(
    model: &mut Model,
    units: &[UnitDecl],
    scales: &[ScaleDecl],
    options: &CompileOptions,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let mut names: HashMap<String, UnitId> = HashMap::new();
    let mut tag_owners: HashMap<String, UnitId> = HashMap::new();
    let mut states: Vec<State> = Vec::with_capacity(model.units.len() + units.len());
    for id in model.unit_ids() {
        let unit = model.unit(id);
        names.insert(unit.name.clone(), id);
        for tag in &unit.tags {
            tag_owners.insert(tag.clone(), id);
        }
        states.push(if unit.valid {
            State::Done
        } else {
            State::Failed(Diagnostic::error(
                Stage::Semantic,
                format!("Unit '{}' is invalid", unit.name),
            ))
        });
    }

    let mut fail = |states: &mut Vec<State>, id: UnitId, diagnostic: Diagnostic| {
        states[id.0] = State::Failed(diagnostic.clone());
        diagnostics.push(diagnostic);
    };

    let mut pending: Vec<(UnitId, &UnitDecl)> = Vec::with_capacity(units.len());
    let mut aliases: Vec<(UnitId, UnitId)> = Vec::new();

    for decl in units {
        let kind = decl.numeric_kind.unwrap_or(options.numeric_kind);
        let id = model.push_unit(UnitType::pending(&decl.name, decl.span, kind));
        states.push(State::Pending);

        let mut redeclares = None;
        if let Some(&previous) = names.get(&decl.name) {
            if model.is_late_unit(previous) {
                fail(
                    &mut states,
                    id,
                    semantic_error(format!("Duplicate unit '{}'", decl.name), decl.span),
                );
                continue;
            }
            match options.redeclaration {
                RedeclarationPolicy::Reject => {
                    let module = module_of(model.unit(previous)).to_string();
                    fail(
                        &mut states,
                        id,
                        semantic_error(
                            format!("Unit '{}' is already defined in module '{}'", decl.name, module),
                            decl.span,
                        ),
                    );
                    continue;
                }
                RedeclarationPolicy::NewFamily => model.units[id.0].redeclared = true,
                RedeclarationPolicy::Alias => aliases.push((id, previous)),
            }
            redeclares = Some(previous);
        }
        names.insert(decl.name.clone(), id);

        let mut clash = None;
        for tag in &decl.tags {
            match tag_owners.get(tag) {
                Some(&owner) if owner != id && Some(owner) != redeclares => {
                    clash = Some((tag, owner));
                    break;
                }
                _ => {
                    tag_owners.insert(tag.clone(), id);
                }
            }
        }
        if let Some((tag, owner)) = clash {
            let owner = model.unit(owner).name.clone();
            fail(
                &mut states,
                id,
                semantic_error(
                    format!("Symbol \"{}\" is already used by unit '{}'", tag, owner),
                    decl.span,
                ),
            );
            continue;
        }

        pending.push((id, decl));
    }

    let mut pass = 0usize;
    loop {
        pass += 1;
        let before = pending.len();
        let mut deferred = Vec::new();
        for (id, decl) in pending {
            let outcome = {
                let scope = Scope {
                    model: &*model,
                    names: &names,
                    states: &states,
                };
                encode_unit(decl, model.unit(id).kind, &scope)
            };
            match outcome {
                Ok(encoded) => {
                    let unit = &mut model.units[id.0];
                    unit.dimension = encoded.dimension;
                    unit.factor = encoded.factor;
                    unit.format = decl
                        .format
                        .clone()
                        .unwrap_or_else(|| options.default_format.clone());
                    unit.tags = decl.tags.clone();
                    unit.valid = true;
                    states[id.0] = State::Done;
                }
                Err(Failure::Deferred { name, span }) => deferred.push((id, decl, name, span)),
                Err(Failure::Failed(diagnostic)) => fail(&mut states, id, diagnostic),
                Err(Failure::Internal(message)) => return Err(Error::Internal(message)),
            }
        }
        tracing::debug!(
            pass,
            resolved = before - deferred.len(),
            deferred = deferred.len(),
            "Elaboration pass"
        );

        if deferred.is_empty() {
            break;
        }
        if deferred.len() == before {
            for (id, _, name, span) in deferred {
                fail(
                    &mut states,
                    id,
                    semantic_error(format!("Unresolved reference '{}'", name), span),
                );
            }
            break;
        }
        pending = deferred
            .into_iter()
            .map(|(id, decl, _, _)| (id, decl))
            .collect();
    }

    let mut removed = Vec::new();
    for (id, previous) in aliases {
        if !matches!(states[id.0], State::Done) {
            continue;
        }
        let (late, early) = (model.unit(id), model.unit(previous));
        let equal = late.kind == early.kind
            && late.dimension.value == early.dimension.value
            && late.factor.value.approx_eq(&early.factor.value, FACTOR_TOLERANCE);
        if equal {
            tracing::debug!(unit = %late.name, module = module_of(early), "Late unit aliases compiled unit");
            names.insert(late.name.clone(), previous);
            removed.push(id);
        } else {
            let diagnostic = semantic_error(
                format!(
                    "Unit '{}' redeclares the unit from module '{}' with a different definition",
                    late.name,
                    module_of(early)
                ),
                late.origin.span().unwrap_or_default(),
            );
            model.units[id.0].valid = false;
            fail(&mut states, id, diagnostic);
        }
    }
    for id in removed.iter().rev() {
        model.units.remove(id.0);
        states.remove(id.0);
    }
    for id in names.values_mut() {
        let shift = removed.iter().filter(|r| r.0 < id.0).count();
        *id = UnitId(id.0 - shift);
    }

    let mut scale_names: HashMap<String, ScaleId> = model
        .scale_ids()
        .map(|id| (model.scale(id).name.clone(), id))
        .collect();

    for decl in scales {
        let mut scale = ScaleType {
            name: decl.name.clone(),
            origin: Origin::Declared { span: decl.span },
            unit: names.get(&decl.unit).copied(),
            offset: NumeralExpression::constant(options.numeric_kind.zero()),
            ref_point: decl.ref_point.clone(),
            format: decl.format.clone().unwrap_or_default(),
            family: None,
            prime: None,
            relatives: Vec::new(),
            valid: false,
        };

        let problem = match names.get(&decl.name) {
            Some(&unit) if model.is_late_unit(unit) => Some(semantic_error(
                format!("Name '{}' is already used by a unit", decl.name),
                decl.span,
            )),
            _ => match scale_names.get(&decl.name) {
                Some(&previous) if model.is_late_scale(previous) => Some(semantic_error(
                    format!("Duplicate scale '{}'", decl.name),
                    decl.span,
                )),
                Some(_) if options.redeclaration == RedeclarationPolicy::Reject => {
                    Some(semantic_error(
                        format!("Scale '{}' is already defined", decl.name),
                        decl.span,
                    ))
                }
                _ => None,
            },
        };

        let problem = problem.or_else(|| {
            let scope = Scope {
                model: &*model,
                names: &names,
                states: &states,
            };
            match scale.unit {
                None => Some(semantic_error(
                    format!("Unresolved reference '{}'", decl.unit),
                    decl.unit_span,
                )),
                Some(unit_id) => match &states[unit_id.0] {
                    State::Done => {
                        let unit = model.unit(unit_id);
                        match NumeralEncoder::new(&scope, unit.kind).encode(&decl.offset) {
                            Ok(offset) => {
                                scale.offset = offset;
                                if scale.format.is_empty() {
                                    scale.format = unit.format.clone();
                                }
                                scale.valid = true;
                                None
                            }
                            Err(error) => {
                                let span = error.span().unwrap_or(decl.span);
                                let mut diagnostic = semantic_error(error.to_string(), span);
                                if let EncodeError::InvalidReference { name, .. } = &error {
                                    if let Some(cause) = scope.cause(name) {
                                        diagnostic = diagnostic.caused_by(cause.clone());
                                    }
                                }
                                Some(diagnostic)
                            }
                        }
                    }
                    State::Failed(cause) => Some(
                        semantic_error(
                            format!("Scale '{}' references invalid unit '{}'", decl.name, decl.unit),
                            decl.unit_span,
                        )
                        .caused_by(cause.clone()),
                    ),
                    State::Pending => Some(semantic_error(
                        format!("Unresolved reference '{}'", decl.unit),
                        decl.unit_span,
                    )),
                },
            }
        });

        if let Some(diagnostic) = problem {
            scale.valid = false;
            diagnostics.push(diagnostic);
        }
        let id = model.push_scale(scale);
        // failed declarations still claim their name; the first late one wins
        let claimed = matches!(
            scale_names.get(&decl.name),
            Some(&previous) if model.is_late_scale(previous)
        );
        if !claimed {
            scale_names.insert(decl.name.clone(), id);
        }
    }

    Ok(())
}
