//! Static safety check for parsed expressions.
//!
//! Every node kind the parser can build is allowed; what is checked here are
//! the names. An identifier, member property or object-literal key that is on
//! [`DENYLIST`] rejects the whole expression, wherever it sits in the tree.

use crate::ast::Expr;

/// Names that reach host or prototype-chain internals in a JavaScript host.
pub const DENYLIST: &[&str] = &[
    "process",
    "require",
    "global",
    "globalThis",
    "Function",
    "eval",
    "window",
    "module",
    "exports",
    "this",
    "constructor",
    "__proto__",
    "prototype",
];

pub fn is_denied(name: &str) -> bool {
    DENYLIST.contains(&name)
}

/// Walks the whole tree; a single denied name anywhere fails it.
pub fn is_safe(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Identifier(name) => !is_denied(name),
        Expr::Member(object, property) => !is_denied(property) && is_safe(object),
        Expr::Unary(_, operand) => is_safe(operand),
        Expr::Binary(_, left, right) | Expr::Logical(_, left, right) => {
            is_safe(left) && is_safe(right)
        },
        Expr::Conditional(test, consequent, alternate) => {
            is_safe(test) && is_safe(consequent) && is_safe(alternate)
        },
        Expr::Array(elements) => elements.iter().flatten().all(is_safe),
        Expr::Object(entries) => entries
            .iter()
            .all(|(key, value)| !is_denied(key) && is_safe(value)),
    }
}

/// An expression that passed [`is_safe`]. The evaluator only accepts this type,
/// so nothing unchecked can be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeExpr(Expr);

impl SafeExpr {
    pub fn new(expr: Expr) -> Option<Self> {
        if is_safe(&expr) {
            Some(SafeExpr(expr))
        } else {
            None
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }
}
