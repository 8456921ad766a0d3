//! AST types for the query predicate language.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryAst {
    /// Comparison between two operands: `area(geometry) < 15`, `name = 'x'`
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },

    /// SQL-style pattern match: `name LIKE 'Main%'`
    Like { column: String, pattern: String },

    /// Missing-value test: `name IS NULL` / `name IS NOT NULL`
    IsNull { column: String, negated: bool },

    /// Boolean AND: `expr AND expr`
    And(Vec<QueryAst>),

    /// Boolean OR: `expr OR expr`
    Or(Vec<QueryAst>),

    /// Boolean NOT: `NOT expr`
    Not(Box<QueryAst>),

    /// Always true (empty query)
    True,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Number(f64),
    Str(String),
    /// Geometry measure applied to a spatial column.
    Func(GeomFunc, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomFunc {
    Area,
    Length,
}

impl fmt::Display for GeomFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeomFunc::Area => write!(f, "area"),
            GeomFunc::Length => write!(f, "length"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq, // =
    Ne, // <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "<>"),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

impl QueryAst {
    /// Flatten nested And/Or and drop redundant True branches.
    pub fn simplify(self) -> Self {
        match self {
            QueryAst::And(exprs) => {
                let mut flat = Vec::new();
                for expr in exprs {
                    match expr.simplify() {
                        QueryAst::And(inner) => flat.extend(inner),
                        QueryAst::True => {}
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => QueryAst::True,
                    1 => flat.pop().unwrap(),
                    _ => QueryAst::And(flat),
                }
            }
            QueryAst::Or(exprs) => {
                let mut flat = Vec::new();
                for expr in exprs {
                    match expr.simplify() {
                        QueryAst::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => QueryAst::True,
                    1 => flat.pop().unwrap(),
                    _ => QueryAst::Or(flat),
                }
            }
            QueryAst::Not(inner) => QueryAst::Not(Box::new(inner.simplify())),
            other => other,
        }
    }
}
