//! Query-based row filter.
//!
//! The query text is substituted, parsed, and validated at configure time;
//! execution evaluates the compiled predicate directly against each row, so
//! surviving rows keep their original order and keys by construction.

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::ops::ExecutionContext;
use crate::query::{QueryAst, evaluate_query, parse_query, substitute_variables, validate_query};
use crate::table::{Table, TableSpec};

pub struct QueryFilterOp {
    ast: QueryAst,
    source: String,
}

impl QueryFilterOp {
    /// Compile a query against an input schema. Variable substitution,
    /// parsing, and column validation all happen here, before any row is
    /// processed.
    pub fn configure(
        query: &str,
        variables: &HashMap<String, String>,
        input: &TableSpec,
    ) -> Result<Self> {
        let substituted = substitute_variables(query, variables)?;
        let ast = parse_query(&substituted)
            .map_err(|e| anyhow::anyhow!("Query: parse error in '{}': {}", substituted, e))?;
        validate_query(&ast, input)?;
        Ok(Self {
            ast,
            source: substituted,
        })
    }

    /// The query text after variable substitution.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Filtering never changes the schema.
    pub fn output_spec(&self, input: &TableSpec) -> TableSpec {
        input.clone()
    }

    pub fn execute(&self, input: &Table, ctx: &ExecutionContext) -> Result<Table> {
        let mut output = Table::new(self.output_spec(&input.spec));
        for row in &input.rows {
            let keep = evaluate_query(&self.ast, &input.spec, row)
                .with_context(|| format!("Query: row '{}'", row.key))?;
            if keep {
                output.push(row.clone())?;
            }
            ctx.row_done()?;
        }
        ctx.finish();
        Ok(output)
    }
}
