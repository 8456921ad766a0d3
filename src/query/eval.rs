//! Row evaluator for the query predicate language.

use anyhow::{Result, bail};
use geo::{Area, Euclidean, Length};
use geo_types::Geometry;

use super::ast::{CompareOp, GeomFunc, Operand, QueryAst};
use crate::table::{Cell, ColumnType, Row, TableSpec, parse_wkt};
use crate::utils::like_match;

/// Check that every column the query references exists in the schema and
/// that geometry measures target spatial columns. Run at configure time so
/// bad queries never reach row processing.
pub fn validate_query(ast: &QueryAst, spec: &TableSpec) -> Result<()> {
    match ast {
        QueryAst::True => Ok(()),
        QueryAst::Compare { left, op: _, right } => {
            validate_operand(left, spec)?;
            validate_operand(right, spec)
        }
        QueryAst::Like { column, .. } | QueryAst::IsNull { column, .. } => {
            require_column(column, spec).map(|_| ())
        }
        QueryAst::And(exprs) | QueryAst::Or(exprs) => {
            exprs.iter().try_for_each(|e| validate_query(e, spec))
        }
        QueryAst::Not(inner) => validate_query(inner, spec),
    }
}

fn validate_operand(operand: &Operand, spec: &TableSpec) -> Result<()> {
    match operand {
        Operand::Number(_) | Operand::Str(_) => Ok(()),
        Operand::Column(name) => require_column(name, spec).map(|_| ()),
        Operand::Func(func, name) => {
            let idx = require_column(name, spec)?;
            if spec.columns[idx].kind != ColumnType::Spatial {
                bail!(
                    "Query: {}() requires a spatial column, '{}' is {}",
                    func,
                    name,
                    spec.columns[idx].kind.label()
                );
            }
            Ok(())
        }
    }
}

fn require_column(name: &str, spec: &TableSpec) -> Result<usize> {
    spec.column_index(name)
        .ok_or_else(|| anyhow::anyhow!("Query: unknown column '{}'", name))
}

/// Resolved operand value for one row.
enum Value {
    Missing,
    Num(f64),
    Text(String),
}

/// Evaluate a validated query against one row. A comparison with a missing
/// operand is false, so `IS NULL` is the only way to select missing cells.
pub fn evaluate_query(ast: &QueryAst, spec: &TableSpec, row: &Row) -> Result<bool> {
    match ast {
        QueryAst::True => Ok(true),

        QueryAst::Compare { left, op, right } => {
            let left = resolve(left, spec, row)?;
            let right = resolve(right, spec, row)?;
            Ok(compare(*op, &left, &right))
        }

        QueryAst::Like { column, pattern } => {
            let idx = require_column(column, spec)?;
            match row.cells[idx].render() {
                None => Ok(false),
                Some(text) => Ok(like_match(pattern, &text)),
            }
        }

        QueryAst::IsNull { column, negated } => {
            let idx = require_column(column, spec)?;
            let missing = row.cells[idx].is_missing();
            Ok(if *negated { !missing } else { missing })
        }

        QueryAst::And(exprs) => {
            for expr in exprs {
                if !evaluate_query(expr, spec, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        QueryAst::Or(exprs) => {
            for expr in exprs {
                if evaluate_query(expr, spec, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        QueryAst::Not(inner) => Ok(!evaluate_query(inner, spec, row)?),
    }
}

fn resolve(operand: &Operand, spec: &TableSpec, row: &Row) -> Result<Value> {
    match operand {
        Operand::Number(n) => Ok(Value::Num(*n)),
        Operand::Str(s) => Ok(Value::Text(s.clone())),
        Operand::Column(name) => {
            let idx = require_column(name, spec)?;
            Ok(match &row.cells[idx] {
                Cell::Missing => Value::Missing,
                Cell::Bool(b) => Value::Text(b.to_string()),
                Cell::Text(s) => Value::Text(s.clone()),
                numeric => match numeric.as_f64() {
                    Some(n) => Value::Num(n),
                    None => Value::Missing,
                },
            })
        }
        Operand::Func(func, name) => {
            let idx = require_column(name, spec)?;
            match &row.cells[idx] {
                Cell::Missing => Ok(Value::Missing),
                Cell::Text(text) => {
                    let geometry = parse_wkt(text)?;
                    Ok(Value::Num(measure(*func, &geometry)))
                }
                other => bail!("Query: spatial column '{}' holds {:?}", name, other),
            }
        }
    }
}

fn measure(func: GeomFunc, geometry: &Geometry<f64>) -> f64 {
    match func {
        GeomFunc::Area => geometry.unsigned_area(),
        GeomFunc::Length => perimeter_free_length(geometry),
    }
}

/// Summed linear length of a geometry's line components. Polygons contribute
/// their ring perimeters; points contribute nothing.
fn perimeter_free_length(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Line(line) => Euclidean.length(line),
        Geometry::LineString(ls) => Euclidean.length(ls),
        Geometry::MultiLineString(mls) => Euclidean.length(mls),
        Geometry::Polygon(p) => {
            Euclidean.length(p.exterior())
                + p.interiors().iter().map(|r| Euclidean.length(r)).sum::<f64>()
        }
        Geometry::MultiPolygon(mp) => mp.iter().map(|p| {
            Euclidean.length(p.exterior())
                + p.interiors().iter().map(|r| Euclidean.length(r)).sum::<f64>()
        }).sum(),
        Geometry::GeometryCollection(gc) => gc.iter().map(perimeter_free_length).sum(),
        Geometry::Rect(r) => {
            let polygon = r.to_polygon();
            Euclidean.length(polygon.exterior())
        }
        Geometry::Triangle(t) => {
            let polygon = t.to_polygon();
            Euclidean.length(polygon.exterior())
        }
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Missing, _) | (_, Value::Missing) => false,
        (Value::Num(l), Value::Num(r)) => match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
        },
        (l, r) => {
            let l = render(l);
            let r = render(r);
            match op {
                CompareOp::Eq => l == r,
                CompareOp::Ne => l != r,
                CompareOp::Lt => l < r,
                CompareOp::Le => l <= r,
                CompareOp::Gt => l > r,
                CompareOp::Ge => l >= r,
            }
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Missing => String::new(),
        Value::Num(n) => n.to_string(),
        Value::Text(s) => s.clone(),
    }
}
