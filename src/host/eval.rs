//! Unit program execution.
//!
//! Executing a program builds a namespace; it never mutates the unit it
//! belongs to. The caller decides what to do with the resulting
//! [`EvalOutcome`] (usually [`crate::host::Unit::apply_outcome`]).
//!
//! Initialization is two-pass where static-analysis content matters:
//! pass one runs the program normally, pass two re-runs it with the
//! static-analysis flag raised, and only names the first pass did not
//! produce are merged in. Runtime bindings always win.

use smol_str::SmolStr;
use std::sync::Arc;

use crate::base::{AttrName, ObjectIds, UnitName};
use crate::ctx::RunCtx;
use crate::error::ExtractError;
use crate::host::namespace::Namespace;
use crate::host::value::{
    ClassValue, FnValue, InstanceValue, ParamValue, PlaceholderKind, Value, ValueKind,
};
use crate::host::Host;
use crate::source::{ClassDecl, Expr, FnDecl, Member, Stmt, UnitSource};

/// Whether static-only blocks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticMode {
    /// Normal execution; `if typecheck` blocks are skipped.
    Runtime,
    /// Static-analysis execution; `if typecheck` blocks run too.
    TypeCheck,
}

/// Everything a program run produces.
#[derive(Debug)]
pub struct EvalOutcome {
    pub namespace: Namespace,
    pub doc: Option<SmolStr>,
    pub exports: Option<Vec<AttrName>>,
    pub is_package: bool,
}

/// Execute a unit program over a seed namespace.
pub fn exec_program(
    host: &mut Host,
    ctx: &mut RunCtx,
    unit_name: &UnitName,
    source: &UnitSource,
    seed: Namespace,
    mode: StaticMode,
) -> Result<EvalOutcome, ExtractError> {
    let mut outcome = EvalOutcome {
        namespace: seed,
        doc: None,
        exports: None,
        is_package: false,
    };
    exec_stmts(host, ctx, unit_name, &source.program, &mut outcome, mode)?;
    Ok(outcome)
}

/// Execute a unit program twice, runtime pass then static-analysis pass,
/// merging from the second pass only the names the first did not bind.
pub fn exec_two_pass(
    host: &mut Host,
    ctx: &mut RunCtx,
    unit_name: &UnitName,
    source: &UnitSource,
    seed: Namespace,
) -> Result<EvalOutcome, ExtractError> {
    let runtime = exec_program(host, ctx, unit_name, source, seed, StaticMode::Runtime)?;
    let statics = exec_program(
        host,
        ctx,
        unit_name,
        source,
        runtime.namespace.clone(),
        StaticMode::TypeCheck,
    )?;

    let mut merged = runtime.namespace;
    for (name, value) in statics.namespace.iter() {
        if !merged.contains(name) {
            merged.insert(name.clone(), value.clone());
        }
    }
    Ok(EvalOutcome {
        namespace: merged,
        doc: runtime.doc.or(statics.doc),
        exports: runtime.exports.or(statics.exports),
        is_package: runtime.is_package || statics.is_package,
    })
}

fn exec_stmts(
    host: &mut Host,
    ctx: &mut RunCtx,
    unit_name: &UnitName,
    stmts: &[Stmt],
    outcome: &mut EvalOutcome,
    mode: StaticMode,
) -> Result<(), ExtractError> {
    let ids = host.ids().clone();
    for stmt in stmts {
        match stmt {
            Stmt::Package => outcome.is_package = true,
            Stmt::Doc(text) => outcome.doc = Some(text.clone()),
            Stmt::Export(names) => outcome.exports = Some(names.clone()),
            Stmt::UseAttr { unit, attr, alias } => {
                let target = host.resolve(ctx, unit)?;
                let value = target.attr(ctx, attr.as_str())?;
                let bind = alias.clone().unwrap_or_else(|| attr.clone());
                outcome.namespace.insert(bind, value);
            }
            Stmt::UseUnit { unit, alias } => {
                let target = host.resolve(ctx, unit)?;
                let bind = alias.clone().unwrap_or_else(|| unit.relname());
                outcome.namespace.insert(bind, Value::unit(target));
            }
            Stmt::UseStar { unit } => {
                let target = host.resolve(ctx, unit)?;
                for export in target.export_list(ctx)? {
                    let value = target.attr(ctx, export.as_str())?;
                    outcome.namespace.insert(export, value);
                }
            }
            // Markers only matter to source discovery; executing one is a
            // no-op.
            Stmt::Marker { .. } => {}
            Stmt::Let { name, value } => {
                let value = eval_expr(&ids, ctx, &outcome.namespace, value)?;
                outcome.namespace.insert(name.clone(), value);
            }
            Stmt::StaticOnly(body) => {
                if mode == StaticMode::TypeCheck {
                    exec_stmts(host, ctx, unit_name, body, outcome, mode)?;
                }
            }
            Stmt::Fn(decl) => {
                let value = eval_fn(&ids, ctx, &outcome.namespace, decl)?;
                outcome.namespace.insert(decl.name.clone(), value);
            }
            Stmt::Class(decl) => {
                let value = eval_class(&ids, ctx, &outcome.namespace, decl)?;
                outcome.namespace.insert(decl.name.clone(), value);
            }
            Stmt::Fail(message) => {
                return Err(ExtractError::Failed(message.to_string()));
            }
        }
    }
    Ok(())
}

// ============================================================================
// DECLARATIONS
// ============================================================================

fn eval_fn(
    ids: &ObjectIds,
    ctx: &mut RunCtx,
    ns: &Namespace,
    decl: &FnDecl,
) -> Result<Value, ExtractError> {
    let mut params = Vec::with_capacity(decl.params.len());
    for param in &decl.params {
        let default = param
            .default
            .as_ref()
            .map(|expr| eval_expr(ids, ctx, ns, expr))
            .transpose()?;
        params.push(ParamValue {
            name: param.name.clone(),
            annotation: param.annotation.clone(),
            default,
        });
    }
    let function = Value::function(Arc::new(FnValue {
        id: ids.alloc(),
        name: decl.name.clone(),
        doc: decl.doc.clone(),
        params,
        ret: decl.ret.clone(),
    }));
    apply_decorators(ids, ctx, ns, function, &decl.decorators)
}

fn eval_class(
    ids: &ObjectIds,
    ctx: &mut RunCtx,
    ns: &Namespace,
    decl: &ClassDecl,
) -> Result<Value, ExtractError> {
    let mut bases = Vec::with_capacity(decl.bases.len());
    for expr in &decl.bases {
        let base = eval_expr(ids, ctx, ns, expr)?;
        match &base.kind {
            ValueKind::Class(_) | ValueKind::Placeholder(_) => bases.push(base),
            _ => {
                return Err(ExtractError::invalid_class_form(
                    decl.name.as_str(),
                    format!("base must be a class, got {}", base.type_name()),
                ));
            }
        }
    }

    let metaclass = match &decl.metaclass {
        None => None,
        Some(expr) => {
            let value = eval_expr(ids, ctx, ns, expr)?;
            match &value.kind {
                ValueKind::Class(_) => Some(value),
                ValueKind::Placeholder(p) if p.kind == PlaceholderKind::Metaclass => {
                    Some(value)
                }
                ValueKind::Placeholder(p) => {
                    return Err(ExtractError::invalid_class_form(
                        decl.name.as_str(),
                        format!(
                            "metaclass {p} was synthesized without the metaclass \
                             special form"
                        ),
                    ));
                }
                _ => {
                    return Err(ExtractError::invalid_class_form(
                        decl.name.as_str(),
                        format!("metaclass must be a class, got {}", value.type_name()),
                    ));
                }
            }
        }
    };

    let mut members = Namespace::new();
    for member in &decl.members {
        match member {
            Member::Let { name, value } => {
                let value = eval_expr(ids, ctx, ns, value)?;
                members.insert(name.clone(), value);
            }
            Member::Fn(fn_decl) => {
                let value = eval_fn(ids, ctx, ns, fn_decl)?;
                members.insert(fn_decl.name.clone(), value);
            }
        }
    }

    let class = Value::class(Arc::new(ClassValue {
        id: ids.alloc(),
        name: decl.name.clone(),
        doc: decl.doc.clone(),
        bases,
        metaclass,
        members,
    }));
    apply_decorators(ids, ctx, ns, class, &decl.decorators)
}

/// Apply decorator expressions to a declared value, innermost first.
///
/// Decorator-form placeholders pass the declaration through untouched, so
/// doc strings and signatures survive stubbed decorators. Any other
/// placeholder swallows the declaration into a call traversal, exactly as
/// calling it would.
fn apply_decorators(
    ids: &ObjectIds,
    ctx: &mut RunCtx,
    ns: &Namespace,
    mut value: Value,
    decorators: &[Expr],
) -> Result<Value, ExtractError> {
    for expr in decorators.iter().rev() {
        let decorator = eval_expr(ids, ctx, ns, expr)?;
        value = match &decorator.kind {
            ValueKind::Placeholder(p) if p.kind == PlaceholderKind::Decorator => value,
            ValueKind::Placeholder(p) => Value::placeholder(p.traverse_call(ids, 1)),
            ValueKind::Class(_) | ValueKind::Function(_) | ValueKind::Instance(_) => {
                Value::instance(Arc::new(InstanceValue {
                    id: ids.alloc(),
                    callee: decorator,
                    args: vec![value],
                }))
            }
            _ => {
                return Err(ExtractError::NotCallable {
                    value: decorator.type_name().to_string(),
                });
            }
        };
    }
    Ok(value)
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

fn eval_expr(
    ids: &ObjectIds,
    ctx: &mut RunCtx,
    ns: &Namespace,
    expr: &Expr,
) -> Result<Value, ExtractError> {
    match expr {
        Expr::Int(v) => Ok(Value::int(ids, *v)),
        Expr::Str(v) => Ok(Value::str(ids, v.clone())),
        Expr::Bool(v) => Ok(Value::bool(ids, *v)),
        Expr::Ref { path } => {
            let (head, rest) = path
                .split_first()
                .ok_or_else(|| ExtractError::name_not_found("<empty reference>"))?;
            let mut value = ns
                .get(head.as_str())
                .cloned()
                .ok_or_else(|| ExtractError::name_not_found(head.as_str()))?;
            for segment in rest {
                value = value_attr(ids, ctx, &value, segment.as_str())?;
            }
            Ok(value)
        }
        Expr::Call { callee, args } => {
            let callee = eval_expr(ids, ctx, ns, callee)?;
            let args = args
                .iter()
                .map(|a| eval_expr(ids, ctx, ns, a))
                .collect::<Result<Vec<_>, _>>()?;
            call_value(ids, ctx, callee, args)
        }
    }
}

fn value_attr(
    ids: &ObjectIds,
    ctx: &mut RunCtx,
    value: &Value,
    attr: &str,
) -> Result<Value, ExtractError> {
    match &value.kind {
        ValueKind::Unit(unit) => unit.attr(ctx, attr),
        ValueKind::Placeholder(p) => Ok(Value::placeholder(p.traverse_attr(ids, attr))),
        ValueKind::Class(class) => class
            .members
            .get(attr)
            .cloned()
            .ok_or_else(|| ExtractError::attr_not_found(class.name.as_str(), attr)),
        _ => Err(ExtractError::attr_not_found(value.type_name(), attr)),
    }
}

fn call_value(
    ids: &ObjectIds,
    _ctx: &mut RunCtx,
    callee: Value,
    args: Vec<Value>,
) -> Result<Value, ExtractError> {
    match &callee.kind {
        ValueKind::Placeholder(p) => {
            Ok(Value::placeholder(p.traverse_call(ids, args.len())))
        }
        ValueKind::Class(_) | ValueKind::Function(_) | ValueKind::Instance(_) => {
            Ok(Value::instance(Arc::new(InstanceValue {
                id: ids.alloc(),
                callee,
                args,
            })))
        }
        _ => Err(ExtractError::NotCallable {
            value: callee.type_name().to_string(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
