use std::collections::HashSet;
use tree_sitter::Node;

use super::context::AnalysisContext;
use super::model::{CallEdge, ImportBinding, ImportKind, ResolutionSource};

/// Callee expression of a call site, reduced to the two shapes the
/// heuristics can resolve: a bare identifier or a one-level property access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalleeExpr {
    Ident(String),
    Member { object: String, property: String },
}

/// A call site found in a declaration body, before resolution
#[derive(Debug, Clone)]
pub struct RawCall {
    pub callee: CalleeExpr,
    pub line: usize,
    pub is_async: bool,
}

/// Collect every call expression in a body, distinguishing `await f()`
/// (async edge) from `f()` (sync edge). Side-effect-free recursion over the
/// immutable syntax tree.
pub fn collect_calls(node: Node, source: &str) -> Vec<RawCall> {
    let mut calls = Vec::new();
    collect_calls_into(node, source, &mut calls);
    calls
}

fn collect_calls_into(node: Node, source: &str, out: &mut Vec<RawCall>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = callee_expr(node, source) {
            let is_async = node
                .parent()
                .map(|p| p.kind() == "await_expression")
                .unwrap_or(false);
            out.push(RawCall {
                callee,
                line: node.start_position().row + 1,
                is_async,
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls_into(child, source, out);
    }
}

/// Reduce a call's function expression to a resolvable shape. Anything with
/// deeper indirection (computed access, chained calls) is skipped; those
/// edges are out of scope for static resolution.
fn callee_expr(call: Node, source: &str) -> Option<CalleeExpr> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(CalleeExpr::Ident(node_text(function, source))),
        "member_expression" => {
            let object = function.child_by_field_name("object")?;
            let property = function.child_by_field_name("property")?;
            let object_ok = object.kind() == "identifier" || object.kind() == "this";
            if !object_ok || property.kind() != "property_identifier" {
                return None;
            }
            Some(CalleeExpr::Member {
                object: node_text(object, source),
                property: node_text(property, source),
            })
        }
        _ => None,
    }
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

/// Resolve one raw call against the caller file's local declarations and
/// import bindings. Returns None for edges that resolve to neither; the
/// graph intentionally contains only edges to statically known code.
///
/// A cross-file resolution triggers lazy analysis of the target file through
/// the context's cache and follows re-export alias chains to the declaring
/// file. Every returned edge has exactly one resolution source.
pub fn resolve_edge(
    ctx: &mut AnalysisContext,
    caller: &str,
    raw: &RawCall,
    locals: &HashSet<String>,
    imports: &[ImportBinding],
) -> Option<CallEdge> {
    match &raw.callee {
        CalleeExpr::Ident(name) => {
            if locals.contains(name.as_str()) {
                return Some(local_edge(caller, name, name, raw));
            }

            let binding = imports.iter().find(|b| {
                b.local_name == *name && b.kind != ImportKind::Namespace
            })?;
            // Unresolvable imports keep no edge unless a local declaration
            // matched above
            let target = binding.resolved_path.clone()?;

            let symbol = match binding.kind {
                ImportKind::Named => binding.imported_name.clone(),
                _ => name.clone(),
            };
            let (declaring_file, declaring_symbol) = ctx.resolve_symbol(&target, &symbol);

            Some(import_edge(caller, name, name, raw, declaring_file, declaring_symbol))
        }
        CalleeExpr::Member { object, property } => {
            // `this.method()` resolves against the enclosing class's members
            if object == "this" {
                if locals.contains(property.as_str()) {
                    let display = format!("this.{}", property);
                    return Some(local_edge(caller, property, &display, raw));
                }
                return None;
            }

            // `ns.fn()` through a namespace import
            let binding = imports.iter().find(|b| {
                b.local_name == *object && b.kind == ImportKind::Namespace
            })?;
            let target = binding.resolved_path.clone()?;

            let (declaring_file, declaring_symbol) = ctx.resolve_symbol(&target, property);
            let display = format!("{}.{}", object, property);

            Some(import_edge(caller, property, &display, raw, declaring_file, declaring_symbol))
        }
    }
}

fn local_edge(caller: &str, callee: &str, display: &str, raw: &RawCall) -> CallEdge {
    CallEdge {
        caller: caller.to_string(),
        callee: callee.to_string(),
        display_name: display.to_string(),
        is_async: raw.is_async,
        line: raw.line,
        resolved_path: None,
        resolved_symbol: None,
        source: ResolutionSource::Local,
    }
}

fn import_edge(
    caller: &str,
    callee: &str,
    display: &str,
    raw: &RawCall,
    declaring_file: std::path::PathBuf,
    declaring_symbol: String,
) -> CallEdge {
    let resolved_symbol = if declaring_symbol == callee {
        None
    } else {
        Some(declaring_symbol)
    };
    CallEdge {
        caller: caller.to_string(),
        callee: callee.to_string(),
        display_name: display.to_string(),
        is_async: raw.is_async,
        line: raw.line,
        resolved_path: Some(declaring_file),
        resolved_symbol,
        source: ResolutionSource::Import,
    }
}
