//! Row-pairwise topological relation evaluation.
//!
//! Appends one boolean column to the left table holding the result of a
//! binary DE-9IM predicate between the left and right geometry of each row
//! pair. Row-count and CRS mismatches are configure-time errors.

use anyhow::{Context, Result, bail};
use geo::Relate;
use geo_types::Geometry;
use std::str::FromStr;

use crate::ops::ExecutionContext;
use crate::table::{Cell, ColumnSpec, ColumnType, Row, Table, TableSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPredicate {
    Disjoint,
    Intersects,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
    Equals,
}

impl RelationPredicate {
    pub const ALL: [RelationPredicate; 8] = [
        RelationPredicate::Disjoint,
        RelationPredicate::Intersects,
        RelationPredicate::Touches,
        RelationPredicate::Crosses,
        RelationPredicate::Within,
        RelationPredicate::Contains,
        RelationPredicate::Overlaps,
        RelationPredicate::Equals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RelationPredicate::Disjoint => "disjoint",
            RelationPredicate::Intersects => "intersects",
            RelationPredicate::Touches => "touches",
            RelationPredicate::Crosses => "crosses",
            RelationPredicate::Within => "within",
            RelationPredicate::Contains => "contains",
            RelationPredicate::Overlaps => "overlaps",
            RelationPredicate::Equals => "equals",
        }
    }

    pub fn evaluate(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        let matrix = left.relate(right);
        match self {
            RelationPredicate::Disjoint => matrix.is_disjoint(),
            RelationPredicate::Intersects => matrix.is_intersects(),
            RelationPredicate::Touches => matrix.is_touches(),
            RelationPredicate::Crosses => matrix.is_crosses(),
            RelationPredicate::Within => matrix.is_within(),
            RelationPredicate::Contains => matrix.is_contains(),
            RelationPredicate::Overlaps => matrix.is_overlaps(),
            RelationPredicate::Equals => matrix.is_equal_topo(),
        }
    }
}

impl FromStr for RelationPredicate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        RelationPredicate::ALL
            .into_iter()
            .find(|p| p.name() == lowered)
            .ok_or_else(|| anyhow::anyhow!("Relation: unknown predicate '{}'", s))
    }
}

pub struct RelationOp {
    pub predicate: RelationPredicate,
    /// Name of the appended boolean column.
    pub column: String,
}

impl RelationOp {
    pub fn new(predicate: RelationPredicate) -> Self {
        Self {
            predicate,
            column: format!("{}?", predicate.name()),
        }
    }

    /// Validate both tables and derive the output schema: the left schema
    /// plus one boolean column.
    pub fn configure(&self, left: &Table, right: &Table) -> Result<TableSpec> {
        let Some((_, left_geom)) = left.spec.geometry_column() else {
            bail!("Relation: left table has no geometry column");
        };
        let Some((_, right_geom)) = right.spec.geometry_column() else {
            bail!("Relation: right table has no geometry column");
        };

        if left.len() != right.len() {
            bail!(
                "Relation: tables differ in length ({} vs {} rows)",
                left.len(),
                right.len()
            );
        }

        match (left_geom.crs(), right_geom.crs()) {
            (Some(a), Some(b)) if a.matches(&b) => {}
            (Some(a), Some(b)) => {
                bail!(
                    "Relation: coordinate reference systems differ ({} vs {})",
                    a.code,
                    b.code
                );
            }
            _ => bail!("Relation: geometry column lacks CRS metadata"),
        }

        let mut columns = left.spec.columns.clone();
        if columns.iter().any(|c| c.name == self.column) {
            bail!("Relation: output column '{}' already exists", self.column);
        }
        columns.push(ColumnSpec::new(&self.column, ColumnType::Bool));
        Ok(TableSpec::new(columns))
    }

    pub fn execute(
        &self,
        left: &Table,
        right: &Table,
        ctx: &ExecutionContext,
    ) -> Result<Table> {
        let spec = self.configure(left, right)?;
        let (left_col, _) = left.spec.geometry_column().unwrap();
        let (right_col, _) = right.spec.geometry_column().unwrap();

        let mut output = Table::new(spec);
        for i in 0..left.len() {
            let a = left
                .geometry_at(i, left_col)
                .context("Relation: left geometry")?;
            let b = right
                .geometry_at(i, right_col)
                .context("Relation: right geometry")?;

            let cell = match (a, b) {
                (Some(a), Some(b)) => Cell::Bool(self.predicate.evaluate(&a, &b)),
                // A missing geometry on either side yields a missing result
                _ => Cell::Missing,
            };

            let mut cells = left.rows[i].cells.clone();
            cells.push(cell);
            output.push(Row::new(left.rows[i].key.clone(), cells))?;
            ctx.row_done()?;
        }
        ctx.finish();
        Ok(output)
    }
}
