//! Geometry aggregation: bounding box, union, centroid.

use anyhow::{Context, Result, bail};
use geo::{BooleanOps, BoundingRect, Centroid};
use geo_types::{Geometry, MultiLineString, MultiPoint, MultiPolygon, Rect};

use crate::ops::ExecutionContext;
use crate::table::{Cell, Row, Table, TableSpec, geometry_to_wkt};

fn geometry_only_spec(input: &Table) -> Result<(usize, TableSpec)> {
    let Some((idx, column)) = input.spec.geometry_column() else {
        bail!("Aggregate: input table has no geometry column");
    };
    Ok((idx, TableSpec::new(vec![column.clone()])))
}

/// Folds an expanding envelope over every geometry and emits one summary
/// row. Envelope union is commutative and associative, so the result does
/// not depend on row order.
pub struct BoundingBoxOp;

impl BoundingBoxOp {
    pub fn configure(&self, input: &Table) -> Result<TableSpec> {
        geometry_only_spec(input).map(|(_, spec)| spec)
    }

    pub fn execute(&self, input: &Table, ctx: &ExecutionContext) -> Result<Table> {
        let (geom_col, spec) = geometry_only_spec(input)?;

        let mut envelope: Option<Rect<f64>> = None;
        for i in 0..input.len() {
            if let Some(geometry) = input.geometry_at(i, geom_col)?
                && let Some(rect) = geometry.bounding_rect()
            {
                envelope = Some(match envelope {
                    None => rect,
                    Some(acc) => merge_rects(acc, rect),
                });
            }
            ctx.row_done()?;
        }
        ctx.finish();

        let cell = match envelope {
            Some(rect) => Cell::Text(geometry_to_wkt(&Geometry::Polygon(rect.to_polygon()))),
            None => Cell::Missing,
        };
        let mut output = Table::new(spec);
        output.push(Row::new("Row0", vec![cell]))?;
        Ok(output)
    }
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo_types::coord! {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        geo_types::coord! {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Incremental pairwise set-union over all geometries, seeded by the first.
///
/// Union is commutative and associative, so the result is independent of row
/// order, though floating-point accumulation order can shift coordinates by
/// tiny amounts between runs. That imprecision is accepted.
pub struct UnionOp;

/// Accumulator for the union fold, split by geometric dimension. Mixing
/// dimensions in one table is rejected, as is GEOMETRYCOLLECTION input.
/// Areal inputs union geometrically; puntal inputs collect with coincident
/// points deduplicated; lineal inputs concatenate without noding or
/// merging shared segments.
enum UnionAcc {
    Areal(MultiPolygon<f64>),
    Lineal(MultiLineString<f64>),
    Puntal(MultiPoint<f64>),
}

impl UnionAcc {
    fn seed(geometry: Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Polygon(p) => Ok(UnionAcc::Areal(MultiPolygon(vec![p]))),
            Geometry::MultiPolygon(mp) => Ok(UnionAcc::Areal(mp)),
            Geometry::LineString(ls) => Ok(UnionAcc::Lineal(MultiLineString(vec![ls]))),
            Geometry::MultiLineString(mls) => Ok(UnionAcc::Lineal(mls)),
            Geometry::Point(p) => Ok(UnionAcc::Puntal(MultiPoint(vec![p]))),
            Geometry::MultiPoint(mp) => Ok(UnionAcc::Puntal(mp)),
            Geometry::Rect(r) => Ok(UnionAcc::Areal(MultiPolygon(vec![r.to_polygon()]))),
            Geometry::Triangle(t) => Ok(UnionAcc::Areal(MultiPolygon(vec![t.to_polygon()]))),
            other => bail!("Union: unsupported geometry {:?}", kind_label(&other)),
        }
    }

    fn merge(self, geometry: Geometry<f64>) -> Result<Self> {
        match (self, UnionAcc::seed(geometry)?) {
            (UnionAcc::Areal(acc), UnionAcc::Areal(next)) => {
                Ok(UnionAcc::Areal(acc.union(&next)))
            }
            (UnionAcc::Lineal(mut acc), UnionAcc::Lineal(next)) => {
                acc.0.extend(next.0);
                Ok(UnionAcc::Lineal(acc))
            }
            (UnionAcc::Puntal(mut acc), UnionAcc::Puntal(next)) => {
                for point in next.0 {
                    if !acc.0.contains(&point) {
                        acc.0.push(point);
                    }
                }
                Ok(UnionAcc::Puntal(acc))
            }
            _ => bail!("Union: table mixes geometry dimensions"),
        }
    }

    fn into_geometry(self) -> Geometry<f64> {
        match self {
            UnionAcc::Areal(mp) => Geometry::MultiPolygon(mp),
            UnionAcc::Lineal(mls) => Geometry::MultiLineString(mls),
            UnionAcc::Puntal(mp) => Geometry::MultiPoint(mp),
        }
    }
}

fn kind_label(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

impl UnionOp {
    pub fn configure(&self, input: &Table) -> Result<TableSpec> {
        geometry_only_spec(input).map(|(_, spec)| spec)
    }

    pub fn execute(&self, input: &Table, ctx: &ExecutionContext) -> Result<Table> {
        let (geom_col, spec) = geometry_only_spec(input)?;

        let mut acc: Option<UnionAcc> = None;
        for i in 0..input.len() {
            if let Some(geometry) = input.geometry_at(i, geom_col)? {
                acc = Some(match acc {
                    None => UnionAcc::seed(geometry)
                        .with_context(|| format!("Union: row '{}'", input.rows[i].key))?,
                    Some(acc) => acc
                        .merge(geometry)
                        .with_context(|| format!("Union: row '{}'", input.rows[i].key))?,
                });
            }
            ctx.row_done()?;
        }
        ctx.finish();

        let cell = match acc {
            Some(acc) => Cell::Text(geometry_to_wkt(&acc.into_geometry())),
            None => Cell::Missing,
        };
        let mut output = Table::new(spec);
        output.push(Row::new("Row0", vec![cell]))?;
        Ok(output)
    }
}

/// Replaces each row's geometry with its centroid; every other cell passes
/// through unchanged. Rows are independent.
pub struct CentroidOp;

impl CentroidOp {
    pub fn configure(&self, input: &Table) -> Result<TableSpec> {
        if input.spec.geometry_column().is_none() {
            bail!("Aggregate: input table has no geometry column");
        }
        Ok(input.spec.clone())
    }

    pub fn execute(&self, input: &Table, ctx: &ExecutionContext) -> Result<Table> {
        let spec = self.configure(input)?;
        let (geom_col, _) = input.spec.geometry_column().unwrap();

        let mut output = Table::new(spec);
        for i in 0..input.len() {
            let mut cells = input.rows[i].cells.clone();
            cells[geom_col] = match input.geometry_at(i, geom_col)? {
                Some(geometry) => match geometry.centroid() {
                    Some(point) => Cell::Text(geometry_to_wkt(&Geometry::Point(point))),
                    None => Cell::Missing,
                },
                None => Cell::Missing,
            };
            output.push(Row::new(input.rows[i].key.clone(), cells))?;
            ctx.row_done()?;
        }
        ctx.finish();
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CrsRef;
    use crate::table::{ColumnSpec, ColumnType, parse_wkt};
    use geo::{Area, Relate};

    fn geometry_table(wkts: &[&str]) -> Table {
        let spec = TableSpec::new(vec![ColumnSpec::spatial("geometry", &CrsRef::wgs84())]);
        let mut table = Table::new(spec);
        for (i, wkt) in wkts.iter().enumerate() {
            table
                .push(Row::new(format!("Row{}", i), vec![Cell::Text(wkt.to_string())]))
                .unwrap();
        }
        table
    }

    const SQUARES: [&str; 3] = [
        "POLYGON((0 0,2 0,2 2,0 2,0 0))",
        "POLYGON((1 1,3 1,3 3,1 3,1 1))",
        "POLYGON((10 0,11 0,11 1,10 1,10 0))",
    ];

    #[test]
    fn bbox_folds_all_geometries() {
        let table = geometry_table(&SQUARES);
        let ctx = ExecutionContext::new("test");
        let out = BoundingBoxOp.execute(&table, &ctx).unwrap();
        assert_eq!(out.len(), 1);
        let envelope = parse_wkt(out.rows[0].cells[0].as_str().unwrap()).unwrap();
        let rect = envelope.bounding_rect().unwrap();
        assert_eq!(rect.min().x, 0.0);
        assert_eq!(rect.min().y, 0.0);
        assert_eq!(rect.max().x, 11.0);
        assert_eq!(rect.max().y, 3.0);
    }

    #[test]
    fn bbox_is_order_invariant() {
        let forward = geometry_table(&SQUARES);
        let mut shuffled = SQUARES;
        shuffled.reverse();
        let backward = geometry_table(&shuffled);
        let ctx = ExecutionContext::new("test");

        let a = BoundingBoxOp.execute(&forward, &ctx).unwrap();
        let b = BoundingBoxOp.execute(&backward, &ctx).unwrap();
        assert_eq!(a.rows[0].cells, b.rows[0].cells);
    }

    #[test]
    fn bbox_of_empty_table_is_missing() {
        let table = geometry_table(&[]);
        let ctx = ExecutionContext::new("test");
        let out = BoundingBoxOp.execute(&table, &ctx).unwrap();
        assert_eq!(out.rows[0].cells[0], Cell::Missing);
    }

    #[test]
    fn union_merges_overlapping_polygons() {
        let table = geometry_table(&SQUARES[..2]);
        let ctx = ExecutionContext::new("test");
        let out = UnionOp.execute(&table, &ctx).unwrap();
        let merged = parse_wkt(out.rows[0].cells[0].as_str().unwrap()).unwrap();
        // Two overlapping 2x2 squares sharing a 1x1 overlap: area 7
        assert!((merged.unsigned_area() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn union_is_order_invariant_up_to_tolerance() {
        let forward = geometry_table(&SQUARES);
        let mut shuffled = SQUARES;
        shuffled.rotate_left(1);
        let rotated = geometry_table(&shuffled);
        let ctx = ExecutionContext::new("test");

        let a = parse_wkt(
            UnionOp
                .execute(&forward, &ctx)
                .unwrap()
                .rows[0]
                .cells[0]
                .as_str()
                .unwrap(),
        )
        .unwrap();
        let b = parse_wkt(
            UnionOp
                .execute(&rotated, &ctx)
                .unwrap()
                .rows[0]
                .cells[0]
                .as_str()
                .unwrap(),
        )
        .unwrap();

        assert!((a.unsigned_area() - b.unsigned_area()).abs() < 1e-9);
        assert!(a.relate(&b).is_equal_topo());
    }

    #[test]
    fn union_collects_points() {
        let table = geometry_table(&["POINT(0 0)", "POINT(1 1)"]);
        let ctx = ExecutionContext::new("test");
        let out = UnionOp.execute(&table, &ctx).unwrap();
        let merged = parse_wkt(out.rows[0].cells[0].as_str().unwrap()).unwrap();
        assert!(matches!(merged, Geometry::MultiPoint(mp) if mp.0.len() == 2));
    }

    #[test]
    fn union_deduplicates_coincident_points() {
        let table = geometry_table(&["POINT(0 0)", "POINT(0 0)", "POINT(1 1)"]);
        let ctx = ExecutionContext::new("test");
        let out = UnionOp.execute(&table, &ctx).unwrap();
        let merged = parse_wkt(out.rows[0].cells[0].as_str().unwrap()).unwrap();
        assert!(matches!(merged, Geometry::MultiPoint(mp) if mp.0.len() == 2));
    }

    #[test]
    fn union_rejects_mixed_dimensions() {
        let table = geometry_table(&["POINT(0 0)", SQUARES[0]]);
        let ctx = ExecutionContext::new("test");
        assert!(UnionOp.execute(&table, &ctx).is_err());
    }

    #[test]
    fn centroid_replaces_geometry_and_keeps_other_cells() {
        let spec = TableSpec::new(vec![
            ColumnSpec::new("name", ColumnType::Text),
            ColumnSpec::spatial("geometry", &CrsRef::wgs84()),
        ]);
        let mut table = Table::new(spec);
        table
            .push(Row::new(
                "Row0",
                vec![
                    Cell::Text("square".into()),
                    Cell::Text("POLYGON((0 0,2 0,2 2,0 2,0 0))".into()),
                ],
            ))
            .unwrap();

        let ctx = ExecutionContext::new("test");
        let out = CentroidOp.execute(&table, &ctx).unwrap();
        assert_eq!(out.rows[0].cells[0], Cell::Text("square".into()));
        assert_eq!(out.rows[0].key, "Row0");
        let centroid = parse_wkt(out.rows[0].cells[1].as_str().unwrap()).unwrap();
        assert_eq!(centroid, Geometry::Point(geo_types::Point::new(1.0, 1.0)));
    }

    #[test]
    fn centroid_of_missing_geometry_is_missing() {
        let mut table = geometry_table(&[]);
        table.push(Row::new("Row0", vec![Cell::Missing])).unwrap();
        let ctx = ExecutionContext::new("test");
        let out = CentroidOp.execute(&table, &ctx).unwrap();
        assert_eq!(out.rows[0].cells[0], Cell::Missing);
    }
}
