//! Attribute-to-column mapping.
//!
//! A source schema describes attributes by declared kind; one mapper is bound
//! per attribute, once per schema, and decides both the output column type
//! and the per-cell conversion. Classification is a closed dispatch resolved
//! at binding time, never re-evaluated per cell.

use anyhow::{Result, bail};
use geo_types::Geometry;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::crs::CrsRef;
use crate::table::{Cell, ColumnSpec, ColumnType, geometry_to_wkt};

/// Declared kind of a source attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Int,
    Long,
    Double,
    Bool,
    /// High-precision decimal; narrowed to double on conversion.
    Decimal,
    Geometry,
    /// Declared kind outside the supported set; carries the source's label.
    Other(String),
}

#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttrKind,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A source attribute value instance.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    /// Lexical decimal representation, as delivered by the source.
    Decimal(String),
    Geometry(Geometry<f64>),
}

/// Conversion target, fixed at binding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Text,
    Int,
    Long,
    Double,
    Bool,
    /// Decimal source narrowed to double with a one-time warning.
    DecimalAsDouble,
    /// Unrecognized declared kind rendered as text.
    OtherAsText,
    /// Geometry rendered as WKT with CRS column metadata.
    Spatial,
}

pub struct AttributeMapper {
    name: String,
    target: Target,
    crs: CrsRef,
    narrowing_warned: AtomicBool,
}

impl AttributeMapper {
    /// Bind one mapper to a schema attribute. Geometry attributes classify
    /// as spatial; other kinds dispatch on the declared binding; anything
    /// unrecognized falls back to text with a warning.
    pub fn bind(descriptor: &AttributeDescriptor, crs: &CrsRef) -> Self {
        let target = match &descriptor.kind {
            AttrKind::Geometry => Target::Spatial,
            AttrKind::Text => Target::Text,
            AttrKind::Int => Target::Int,
            AttrKind::Double => Target::Double,
            AttrKind::Bool => Target::Bool,
            AttrKind::Long => Target::Long,
            AttrKind::Decimal => Target::DecimalAsDouble,
            AttrKind::Other(label) => {
                tracing::warn!(
                    "Schema: attribute '{}' has unsupported kind '{}', rendering as text",
                    descriptor.name,
                    label
                );
                Target::OtherAsText
            }
        };
        Self {
            name: descriptor.name.clone(),
            target,
            crs: crs.clone(),
            narrowing_warned: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_spec(&self) -> ColumnSpec {
        match self.target {
            Target::Text | Target::OtherAsText => ColumnSpec::new(&self.name, ColumnType::Text),
            Target::Int => ColumnSpec::new(&self.name, ColumnType::Int),
            Target::Long => ColumnSpec::new(&self.name, ColumnType::Long),
            Target::Double | Target::DecimalAsDouble => {
                ColumnSpec::new(&self.name, ColumnType::Double)
            }
            Target::Bool => ColumnSpec::new(&self.name, ColumnType::Bool),
            Target::Spatial => ColumnSpec::spatial(&self.name, &self.crs),
        }
    }

    /// Convert one attribute value into a cell.
    ///
    /// Null always yields the missing cell. Text-like values (text, fallback
    /// text, WKT) that serialize to the empty string also yield missing, not
    /// an empty string. A value whose kind contradicts the declared binding
    /// is an error, fatal to the row.
    pub fn convert(&self, value: &AttrValue) -> Result<Cell> {
        if matches!(value, AttrValue::Null) {
            return Ok(Cell::Missing);
        }
        match (self.target, value) {
            (Target::Text, AttrValue::Text(s)) => Ok(text_cell(s.clone())),
            (Target::Int, AttrValue::Int(v)) => Ok(Cell::Int(*v)),
            (Target::Long, AttrValue::Long(v)) => Ok(Cell::Long(*v)),
            (Target::Double, AttrValue::Double(v)) => Ok(Cell::Double(*v)),
            (Target::Bool, AttrValue::Bool(v)) => Ok(Cell::Bool(*v)),
            (Target::DecimalAsDouble, AttrValue::Decimal(s)) => {
                if !self.narrowing_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "Schema: narrowing decimal attribute '{}' to double precision",
                        self.name
                    );
                }
                let v: f64 = s.parse().map_err(|_| {
                    anyhow::anyhow!("Schema: attribute '{}': bad decimal '{}'", self.name, s)
                })?;
                Ok(Cell::Double(v))
            }
            (Target::OtherAsText, other) => Ok(text_cell(render_fallback(other))),
            (Target::Spatial, AttrValue::Geometry(g)) => Ok(text_cell(geometry_to_wkt(g))),
            (_, other) => bail!(
                "Schema: attribute '{}' declared {:?} but row holds {:?}",
                self.name,
                self.target,
                other
            ),
        }
    }
}

fn text_cell(s: String) -> Cell {
    if s.is_empty() { Cell::Missing } else { Cell::Text(s) }
}

fn render_fallback(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => String::new(),
        AttrValue::Text(s) => s.clone(),
        AttrValue::Int(v) => v.to_string(),
        AttrValue::Long(v) => v.to_string(),
        AttrValue::Double(v) => v.to_string(),
        AttrValue::Bool(v) => v.to_string(),
        AttrValue::Decimal(s) => s.clone(),
        AttrValue::Geometry(g) => geometry_to_wkt(g),
    }
}

/// Bind one mapper per schema attribute, in declaration order.
pub fn bind_schema(descriptors: &[AttributeDescriptor], crs: &CrsRef) -> Vec<AttributeMapper> {
    descriptors
        .iter()
        .map(|d| AttributeMapper::bind(d, crs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    fn mapper(kind: AttrKind) -> AttributeMapper {
        AttributeMapper::bind(&AttributeDescriptor::new("attr", kind), &CrsRef::wgs84())
    }

    #[test]
    fn classification_matches_declared_kind() {
        assert_eq!(mapper(AttrKind::Text).column_spec().kind, ColumnType::Text);
        assert_eq!(mapper(AttrKind::Int).column_spec().kind, ColumnType::Int);
        assert_eq!(mapper(AttrKind::Long).column_spec().kind, ColumnType::Long);
        assert_eq!(
            mapper(AttrKind::Double).column_spec().kind,
            ColumnType::Double
        );
        assert_eq!(mapper(AttrKind::Bool).column_spec().kind, ColumnType::Bool);
        assert_eq!(
            mapper(AttrKind::Decimal).column_spec().kind,
            ColumnType::Double
        );
        assert_eq!(
            mapper(AttrKind::Geometry).column_spec().kind,
            ColumnType::Spatial
        );
        assert_eq!(
            mapper(AttrKind::Other("uuid".into())).column_spec().kind,
            ColumnType::Text
        );
    }

    #[test]
    fn null_converts_to_missing_for_every_kind() {
        for kind in [
            AttrKind::Text,
            AttrKind::Int,
            AttrKind::Long,
            AttrKind::Double,
            AttrKind::Bool,
            AttrKind::Decimal,
            AttrKind::Geometry,
            AttrKind::Other("uuid".into()),
        ] {
            assert_eq!(mapper(kind).convert(&AttrValue::Null).unwrap(), Cell::Missing);
        }
    }

    #[test]
    fn text_round_trips_and_empty_collapses_to_missing() {
        let m = mapper(AttrKind::Text);
        assert_eq!(
            m.convert(&AttrValue::Text("hello world".into())).unwrap(),
            Cell::Text("hello world".into())
        );
        assert_eq!(m.convert(&AttrValue::Text(String::new())).unwrap(), Cell::Missing);
    }

    #[test]
    fn decimal_narrows_to_double() {
        let m = mapper(AttrKind::Decimal);
        assert_eq!(
            m.convert(&AttrValue::Decimal("3.25".into())).unwrap(),
            Cell::Double(3.25)
        );
        assert!(m.convert(&AttrValue::Decimal("not a number".into())).is_err());
    }

    #[test]
    fn geometry_renders_as_wkt_text() {
        let m = mapper(AttrKind::Geometry);
        let cell = m
            .convert(&AttrValue::Geometry(Point::new(1.0, 2.0).into()))
            .unwrap();
        assert_eq!(cell, Cell::Text("POINT(1 2)".into()));
        let spec = m.column_spec();
        assert_eq!(spec.crs().unwrap().code, "EPSG:4326");
    }

    #[test]
    fn mismatched_value_kind_is_an_error() {
        let m = mapper(AttrKind::Int);
        assert!(m.convert(&AttrValue::Text("7".into())).is_err());
    }

    #[test]
    fn other_kind_renders_any_value_as_text() {
        let m = mapper(AttrKind::Other("uuid".into()));
        assert_eq!(
            m.convert(&AttrValue::Long(42)).unwrap(),
            Cell::Text("42".into())
        );
    }

    #[test]
    fn bind_schema_produces_one_mapper_per_attribute() {
        let descriptors = vec![
            AttributeDescriptor::new("geometry", AttrKind::Geometry),
            AttributeDescriptor::new("name", AttrKind::Text),
        ];
        let mappers = bind_schema(&descriptors, &CrsRef::wgs84());
        assert_eq!(mappers.len(), 2);
        assert_eq!(mappers[0].name(), "geometry");
        assert_eq!(mappers[1].column_spec().kind, ColumnType::Text);
    }
}
