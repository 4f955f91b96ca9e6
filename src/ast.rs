//! Expression tree produced by the [parser](crate::parser).
//!
//! There is no node for computed (`a[b]`) member access, calls, assignment or
//! any statement form: those are unrepresentable, so nothing downstream has to
//! reject them.


#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    Member(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `None` elements are holes, as in `[1, , 2]`.
    Array(Vec<Option<Expr>>),
    Object(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    BitAnd,
    BitXor,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

impl Expr {
    pub(crate) fn member(object: Expr, property: &str) -> Expr {
        Expr::Member(Box::new(object), property.to_owned())
    }

    pub(crate) fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary(op, Box::new(operand))
    }

    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub(crate) fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
        Expr::Logical(op, Box::new(left), Box::new(right))
    }

    pub(crate) fn conditional(test: Expr, consequent: Expr, alternate: Expr) -> Expr {
        Expr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate))
    }
}
