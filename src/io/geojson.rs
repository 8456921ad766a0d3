//! GeoJSON source and sink.
//!
//! The source infers a schema from feature properties, binds one attribute
//! mapper per column, and converts features row by row. The sink writes a
//! FeatureCollection, parsing the WKT geometry column back into GeoJSON
//! geometries. A non-WGS84 table records its CRS as a legacy `crs` member,
//! which the source honors on read.

use anyhow::{Context, Result, bail};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::crs::CrsRef;
use crate::schema::{AttrKind, AttrValue, AttributeDescriptor, bind_schema};
use crate::table::{Cell, ColumnType, Row, Table, TableSpec, parse_wkt};

pub const GEOMETRY_COLUMN: &str = "geometry";

/// Read a GeoJSON FeatureCollection into a table.
///
/// `default_crs` applies when the file carries no `crs` member; GeoJSON
/// itself is nominally WGS84, but files written by [`write_table`] keep
/// whatever CRS the table had.
pub fn read_table(path: &Path, default_crs: &CrsRef) -> Result<Table> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("GeoJSON: cannot read {:?}", path))?;
    let geojson: GeoJson = raw
        .parse()
        .with_context(|| format!("GeoJSON: cannot parse {:?}", path))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        bail!("GeoJSON: {:?} is not a FeatureCollection", path);
    };

    let crs = embedded_crs(&collection).unwrap_or_else(|| default_crs.clone());
    let descriptors = infer_schema(&collection);
    let mappers = bind_schema(&descriptors, &crs);

    let spec = TableSpec::new(mappers.iter().map(|m| m.column_spec()).collect());
    let mut table = Table::new(spec);

    for (i, feature) in collection.features.iter().enumerate() {
        let key = feature_key(feature, i);
        let mut cells = Vec::with_capacity(mappers.len());
        for (descriptor, mapper) in descriptors.iter().zip(&mappers) {
            let value = attr_value(feature, descriptor)
                .with_context(|| format!("GeoJSON: feature '{}'", key))?;
            let cell = mapper
                .convert(&value)
                .with_context(|| format!("GeoJSON: feature '{}'", key))?;
            cells.push(cell);
        }
        table.push(Row::new(key, cells))?;
    }

    Ok(table)
}

fn embedded_crs(collection: &FeatureCollection) -> Option<CrsRef> {
    let name = collection
        .foreign_members
        .as_ref()?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    match parse_crs_name(name) {
        Some(crs) => Some(crs),
        None => {
            tracing::warn!("GeoJSON: unrecognized crs member '{}', using default", name);
            None
        }
    }
}

/// Accepts both plain authority codes (`EPSG:4326`) and the OGC URN
/// spellings older writers emit (`urn:ogc:def:crs:OGC:1.3:CRS84`,
/// `urn:ogc:def:crs:EPSG::4326`).
fn parse_crs_name(name: &str) -> Option<CrsRef> {
    let lowered = name.to_ascii_lowercase();
    if let Some(rest) = lowered.strip_prefix("urn:ogc:def:crs:") {
        // authority:version:id, version may be empty
        let mut parts = rest.splitn(3, ':');
        let authority = parts.next()?;
        let _version = parts.next()?;
        let id = parts.next()?;
        if authority == "ogc" && id == "crs84" {
            return Some(CrsRef::wgs84());
        }
        return CrsRef::from_code(&format!("{}:{}", authority, id)).ok();
    }
    CrsRef::from_code(name).ok()
}

/// One pass over all features: the geometry column first, then property
/// columns in name order. Conflicting property kinds widen long to double;
/// anything else degrades to the text fallback.
fn infer_schema(collection: &FeatureCollection) -> Vec<AttributeDescriptor> {
    let mut kinds: BTreeMap<String, AttrKind> = BTreeMap::new();

    for feature in &collection.features {
        let Some(properties) = &feature.properties else {
            continue;
        };
        for (name, value) in properties {
            let Some(kind) = json_kind(value) else {
                continue; // null constrains nothing
            };
            kinds
                .entry(name.clone())
                .and_modify(|existing| *existing = widen(existing.clone(), kind.clone()))
                .or_insert(kind);
        }
    }

    let mut descriptors = vec![AttributeDescriptor::new(GEOMETRY_COLUMN, AttrKind::Geometry)];
    descriptors.extend(
        kinds
            .into_iter()
            .map(|(name, kind)| AttributeDescriptor::new(name, kind)),
    );
    descriptors
}

fn json_kind(value: &Value) -> Option<AttrKind> {
    match value {
        Value::Null => None,
        Value::String(_) => Some(AttrKind::Text),
        Value::Bool(_) => Some(AttrKind::Bool),
        Value::Number(n) if n.as_i64().is_some() => Some(AttrKind::Long),
        Value::Number(_) => Some(AttrKind::Double),
        Value::Array(_) | Value::Object(_) => Some(AttrKind::Other("json".into())),
    }
}

fn widen(a: AttrKind, b: AttrKind) -> AttrKind {
    match (a, b) {
        (a, b) if a == b => a,
        (AttrKind::Long, AttrKind::Double) | (AttrKind::Double, AttrKind::Long) => {
            AttrKind::Double
        }
        _ => AttrKind::Other("mixed".into()),
    }
}

fn feature_key(feature: &Feature, index: usize) -> String {
    match &feature.id {
        Some(geojson::feature::Id::String(s)) => s.clone(),
        Some(geojson::feature::Id::Number(n)) => n.to_string(),
        None => format!("Row{}", index),
    }
}

fn attr_value(feature: &Feature, descriptor: &AttributeDescriptor) -> Result<AttrValue> {
    if descriptor.kind == AttrKind::Geometry {
        let Some(geometry) = &feature.geometry else {
            return Ok(AttrValue::Null);
        };
        let geometry = geo_types::Geometry::<f64>::try_from(geometry.value.clone())
            .map_err(|e| anyhow::anyhow!("unsupported geometry: {}", e))?;
        return Ok(AttrValue::Geometry(geometry));
    }

    let value = feature
        .properties
        .as_ref()
        .and_then(|props| props.get(&descriptor.name));
    let Some(value) = value else {
        return Ok(AttrValue::Null);
    };

    Ok(match (&descriptor.kind, value) {
        (_, Value::Null) => AttrValue::Null,
        (AttrKind::Text, Value::String(s)) => AttrValue::Text(s.clone()),
        (AttrKind::Bool, Value::Bool(b)) => AttrValue::Bool(*b),
        (AttrKind::Long, Value::Number(n)) => match n.as_i64() {
            Some(v) => AttrValue::Long(v),
            None => bail!("property '{}' overflows long", descriptor.name),
        },
        (AttrKind::Double, Value::Number(n)) => match n.as_f64() {
            Some(v) => AttrValue::Double(v),
            None => bail!("property '{}' is not representable as double", descriptor.name),
        },
        (AttrKind::Other(_), other) => AttrValue::Text(render_json(other)),
        (kind, other) => bail!(
            "property '{}' declared {:?} but holds {}",
            descriptor.name,
            kind,
            other
        ),
    })
}

fn render_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Streaming FeatureCollection writer.
pub struct GeoJsonSink {
    writer: BufWriter<File>,
    first_feature: bool,
}

impl GeoJsonSink {
    pub fn new(path: &Path, crs: Option<&CrsRef>) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("GeoJSON: cannot create {:?}", path))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{{")?;
        writeln!(writer, "  \"type\": \"FeatureCollection\",")?;
        if let Some(crs) = crs
            && crs.code != crate::crs::WGS84_CODE
        {
            writeln!(
                writer,
                "  \"crs\": {{ \"type\": \"name\", \"properties\": {{ \"name\": {} }} }},",
                Value::String(crs.code.clone())
            )?;
        }
        writeln!(writer, "  \"features\": [")?;

        Ok(Self {
            writer,
            first_feature: true,
        })
    }

    pub fn add_row(&mut self, spec: &TableSpec, row: &Row) -> Result<()> {
        if !self.first_feature {
            writeln!(self.writer, ",")?;
        }
        self.first_feature = false;

        let mut properties = Map::new();
        let mut geometry = None;

        for (column, cell) in spec.columns.iter().zip(&row.cells) {
            if column.kind == ColumnType::Spatial && geometry.is_none() {
                if let Cell::Text(wkt) = cell {
                    let geom = parse_wkt(wkt)
                        .with_context(|| format!("GeoJSON: row '{}'", row.key))?;
                    geometry = Some(geojson::Geometry::from(&geom));
                }
                continue;
            }
            let json_value = match cell {
                Cell::Missing => continue,
                Cell::Text(v) => Value::String(v.clone()),
                Cell::Int(v) => Value::from(*v),
                Cell::Long(v) => Value::from(*v),
                Cell::Double(v) => Value::from(*v),
                Cell::Bool(v) => Value::from(*v),
            };
            properties.insert(column.name.clone(), json_value);
        }

        let feature = Feature {
            bbox: None,
            geometry,
            id: Some(geojson::feature::Id::String(row.key.clone())),
            properties: Some(properties),
            foreign_members: None,
        };

        serde_json::to_writer(&mut self.writer, &GeoJson::Feature(feature))?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "  ]")?;
        writeln!(self.writer, "}}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Write a whole table as a FeatureCollection.
pub fn write_table(table: &Table, path: &Path) -> Result<u64> {
    let crs = table.spec.geometry_crs();
    let mut sink = GeoJsonSink::new(path, crs.as_ref())?;
    for row in &table.rows {
        sink.add_row(&table.spec, row)?;
    }
    sink.finish()?;
    Ok(table.rows.len() as u64)
}
