//! Query predicate language for row filtering.
//!
//! A small CQL-style dialect: column comparisons, `LIKE` patterns,
//! `IS [NOT] NULL`, geometry measures (`area(col)`, `length(col)`),
//! boolean combinators, and `${name}` workflow-variable substitution.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{CompareOp, GeomFunc, Operand, QueryAst};
pub use eval::{evaluate_query, validate_query};
pub use parser::parse_query;

use anyhow::{Result, bail};
use std::collections::HashMap;

/// Replace `${name}` references with workflow-variable values.
///
/// Substitution is purely textual and happens before lexing; an unresolved
/// reference is an error so it surfaces at configure time.
pub fn substitute_variables(input: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!("Query: unterminated variable reference in '{}'", input);
        };
        let name = &after[..end];
        match variables.get(name) {
            Some(value) => out.push_str(value),
            None => bail!("Query: undefined workflow variable '{}'", name),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
