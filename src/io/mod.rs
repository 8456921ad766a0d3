//! Table sources and sinks.

pub mod geojson;

pub use geojson::{GeoJsonSink, read_table, write_table};
