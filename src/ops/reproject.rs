//! Coordinate reprojection between authority-coded reference systems.

use anyhow::{Context, Result, bail};
use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj::Proj;

use crate::crs::CrsRef;
use crate::ops::ExecutionContext;
use crate::table::{Cell, Row, Table, TableSpec, geometry_to_wkt};

pub struct ReprojectOp {
    pub target: CrsRef,
}

impl ReprojectOp {
    pub fn new(target: CrsRef) -> Self {
        Self { target }
    }

    /// Output schema is the input schema with the geometry column's CRS
    /// metadata rewritten to the target.
    pub fn configure(&self, input: &Table) -> Result<TableSpec> {
        let Some((idx, column)) = input.spec.geometry_column() else {
            bail!("Reproject: input table has no geometry column");
        };
        if column.crs().is_none() {
            bail!("Reproject: geometry column lacks CRS metadata");
        }

        let mut columns = input.spec.columns.clone();
        columns[idx].set_crs(&self.target);
        Ok(TableSpec::new(columns))
    }

    pub fn execute(&self, input: &Table, ctx: &ExecutionContext) -> Result<Table> {
        let spec = self.configure(input)?;
        let (geom_col, column) = input.spec.geometry_column().unwrap();
        let source = column.crs().unwrap();

        let transform = Proj::new_known_crs(&source.code, &self.target.code, None)
            .with_context(|| {
                format!(
                    "Reproject: no transformation from {} to {}",
                    source.code, self.target.code
                )
            })?;

        let mut output = Table::new(spec);
        for i in 0..input.len() {
            let mut cells = input.rows[i].cells.clone();
            if let Some(geometry) = input.geometry_at(i, geom_col)? {
                let projected = project_geometry(&transform, &geometry).with_context(|| {
                    format!("Reproject: row '{}'", input.rows[i].key)
                })?;
                cells[geom_col] = Cell::Text(geometry_to_wkt(&projected));
            }
            output.push(Row::new(input.rows[i].key.clone(), cells))?;
            ctx.row_done()?;
        }
        ctx.finish();
        Ok(output)
    }
}

fn project_geometry(transform: &Proj, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
    geometry
        .try_map_coords(|coord| -> Result<Coord<f64>> {
            let (x, y) = transform.convert((coord.x, coord.y))?;
            Ok(Coord { x, y })
        })
        .context("Reproject: coordinate transformation failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnSpec, PROP_CRS_CODE, parse_wkt};

    fn wgs84_table(wkts: &[&str]) -> Table {
        let spec = TableSpec::new(vec![ColumnSpec::spatial("geometry", &CrsRef::wgs84())]);
        let mut table = Table::new(spec);
        for (i, wkt) in wkts.iter().enumerate() {
            table
                .push(Row::new(format!("Row{}", i), vec![Cell::Text(wkt.to_string())]))
                .unwrap();
        }
        table
    }

    #[test]
    fn configure_rewrites_crs_metadata() {
        let table = wgs84_table(&["POINT(5 52)"]);
        let op = ReprojectOp::new(CrsRef::from_code("EPSG:3857").unwrap());
        let spec = op.configure(&table).unwrap();
        assert_eq!(
            spec.columns[0].properties.get(PROP_CRS_CODE).map(String::as_str),
            Some("EPSG:3857")
        );
    }

    #[test]
    fn configure_requires_geometry_column() {
        let table = Table::new(TableSpec::new(vec![ColumnSpec::new(
            "name",
            crate::table::ColumnType::Text,
        )]));
        let op = ReprojectOp::new(CrsRef::wgs84());
        assert!(op.configure(&table).is_err());
    }

    #[test]
    fn reprojects_to_web_mercator_and_back() {
        let table = wgs84_table(&["POINT(0 0)", "POINT(5 52)"]);
        let to_mercator = ReprojectOp::new(CrsRef::from_code("EPSG:3857").unwrap());
        let ctx = ExecutionContext::new("test");
        let projected = to_mercator.execute(&table, &ctx).unwrap();

        let origin = parse_wkt(projected.rows[0].cells[0].as_str().unwrap()).unwrap();
        if let Geometry::Point(p) = origin {
            assert!(p.x().abs() < 1e-6);
            assert!(p.y().abs() < 1e-6);
        } else {
            panic!("expected point");
        }

        let back = ReprojectOp::new(CrsRef::wgs84());
        let restored = back.execute(&projected, &ctx).unwrap();
        let point = parse_wkt(restored.rows[1].cells[0].as_str().unwrap()).unwrap();
        if let Geometry::Point(p) = point {
            assert!((p.x() - 5.0).abs() < 1e-6);
            assert!((p.y() - 52.0).abs() < 1e-6);
        } else {
            panic!("expected point");
        }
    }

    #[test]
    fn missing_geometry_passes_through() {
        let mut table = wgs84_table(&[]);
        table.push(Row::new("Row0", vec![Cell::Missing])).unwrap();
        let op = ReprojectOp::new(CrsRef::from_code("EPSG:3857").unwrap());
        let ctx = ExecutionContext::new("test");
        let out = op.execute(&table, &ctx).unwrap();
        assert_eq!(out.rows[0].cells[0], Cell::Missing);
    }
}
