//! In-memory tabular data model.
//!
//! Tables are column-typed, row-keyed, and carry column-level key/value
//! properties. Geometries are stored as a single WKT text column whose
//! properties hold the CRS authority code and full WKT definition; every row
//! of that column shares the column's CRS by construction.

use anyhow::{Context, Result, bail};
use geo_types::Geometry;
use std::collections::BTreeMap;
use std::str::FromStr;
use wkt::{ToWkt, Wkt};

use crate::crs::CrsRef;

/// Column property key holding the CRS authority code.
pub const PROP_CRS_CODE: &str = "crs.code";
/// Column property key holding the full WKT CRS definition.
pub const PROP_CRS_WKT: &str = "crs.wkt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Long,
    Double,
    Bool,
    /// WKT-encoded geometry with CRS metadata in the column properties.
    Spatial,
}

impl ColumnType {
    pub fn label(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Bool => "bool",
            ColumnType::Spatial => "spatial",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnType,
    pub properties: BTreeMap<String, String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn spatial(name: impl Into<String>, crs: &CrsRef) -> Self {
        let mut spec = Self::new(name, ColumnType::Spatial);
        spec.set_crs(crs);
        spec
    }

    pub fn set_crs(&mut self, crs: &CrsRef) {
        self.properties
            .insert(PROP_CRS_CODE.to_string(), crs.code.clone());
        self.properties
            .insert(PROP_CRS_WKT.to_string(), crs.wkt.clone());
    }

    pub fn crs(&self) -> Option<CrsRef> {
        let code = self.properties.get(PROP_CRS_CODE)?;
        let wkt = self.properties.get(PROP_CRS_WKT).cloned().unwrap_or_default();
        Some(CrsRef {
            code: code.clone(),
            wkt,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The designated geometry column: the first spatial column in the spec.
    pub fn geometry_column(&self) -> Option<(usize, &ColumnSpec)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.kind == ColumnType::Spatial)
    }

    pub fn geometry_crs(&self) -> Option<CrsRef> {
        self.geometry_column().and_then(|(_, c)| c.crs())
    }
}

/// A single cell value. `Missing` stands in for both null source values and
/// text that serialized to the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(f64::from(*v)),
            Cell::Long(v) => Some(*v as f64),
            Cell::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Textual rendering used for string comparisons and sink output.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(v) => Some(v.clone()),
            Cell::Int(v) => Some(v.to_string()),
            Cell::Long(v) => Some(v.to_string()),
            Cell::Double(v) => Some(v.to_string()),
            Cell::Bool(v) => Some(v.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub key: String,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            key: key.into(),
            cells,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub spec: TableSpec,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(spec: TableSpec) -> Self {
        Self {
            spec,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) -> Result<()> {
        if row.cells.len() != self.spec.columns.len() {
            bail!(
                "Table: row '{}' has {} cells, schema has {} columns",
                row.key,
                row.cells.len(),
                self.spec.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse the geometry cell of a row. `None` when the cell is missing.
    pub fn geometry_at(&self, row: usize, col: usize) -> Result<Option<Geometry<f64>>> {
        let cell = &self.rows[row].cells[col];
        match cell {
            Cell::Missing => Ok(None),
            Cell::Text(text) => Ok(Some(parse_wkt(text).with_context(|| {
                format!("Table: invalid WKT in row '{}'", self.rows[row].key)
            })?)),
            other => bail!(
                "Table: geometry column holds non-text cell {:?} in row '{}'",
                other,
                self.rows[row].key
            ),
        }
    }
}

pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    let parsed = Wkt::<f64>::from_str(text)
        .map_err(|e| anyhow::anyhow!("WKT parse error: {}", e))?;
    Geometry::try_from(parsed).map_err(|e| anyhow::anyhow!("WKT conversion error: {:?}", e))
}

pub fn geometry_to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, Point};

    #[test]
    fn spatial_column_carries_crs_properties() {
        let crs = CrsRef::wgs84();
        let spec = ColumnSpec::spatial("geometry", &crs);
        assert_eq!(
            spec.properties.get(PROP_CRS_CODE).map(String::as_str),
            Some("EPSG:4326")
        );
        assert!(spec.properties[PROP_CRS_WKT].contains("WGS 84"));
        assert_eq!(spec.crs().unwrap().code, "EPSG:4326");
    }

    #[test]
    fn geometry_column_is_first_spatial() {
        let spec = TableSpec::new(vec![
            ColumnSpec::new("name", ColumnType::Text),
            ColumnSpec::spatial("geometry", &CrsRef::wgs84()),
        ]);
        let (idx, col) = spec.geometry_column().unwrap();
        assert_eq!(idx, 1);
        assert_eq!(col.name, "geometry");
    }

    #[test]
    fn push_rejects_mismatched_row_width() {
        let spec = TableSpec::new(vec![ColumnSpec::new("name", ColumnType::Text)]);
        let mut table = Table::new(spec);
        assert!(table.push(Row::new("Row0", vec![])).is_err());
    }

    #[test]
    fn wkt_round_trip() {
        let geom = Geometry::Point(Point::new(2.5, -1.0));
        let text = geometry_to_wkt(&geom);
        let back = parse_wkt(&text).unwrap();
        assert_eq!(back, geom);
    }

    #[test]
    fn geometry_at_handles_missing_and_invalid() {
        let spec = TableSpec::new(vec![ColumnSpec::spatial("geometry", &CrsRef::wgs84())]);
        let mut table = Table::new(spec);
        table.push(Row::new("Row0", vec![Cell::Missing])).unwrap();
        table
            .push(Row::new("Row1", vec![Cell::Text("POINT(1 2)".into())]))
            .unwrap();
        table
            .push(Row::new("Row2", vec![Cell::Text("not wkt".into())]))
            .unwrap();

        assert!(table.geometry_at(0, 0).unwrap().is_none());
        assert!(table.geometry_at(1, 0).unwrap().is_some());
        assert!(table.geometry_at(2, 0).is_err());
    }
}
