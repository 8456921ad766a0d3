//! Coordinate reference system references.
//!
//! A geometry column carries two pieces of CRS metadata: the authority code
//! (e.g. `EPSG:4326`) and the full WKT definition. The code is what
//! operations compare; the WKT definition travels along so downstream
//! consumers do not need an authority lookup of their own.

use anyhow::{Result, bail};

pub const WGS84_CODE: &str = "EPSG:4326";

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;

const WEB_MERCATOR_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1],AUTHORITY["EPSG","3857"]]"#;

/// A coordinate reference system, identified by authority code and carrying
/// its WKT definition when one is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsRef {
    pub code: String,
    pub wkt: String,
}

impl CrsRef {
    /// Resolve an authority code like `EPSG:4326`.
    ///
    /// Codes outside the builtin table are accepted with an empty WKT
    /// definition; reprojection by code still works through PROJ.
    pub fn from_code(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            bail!("CRS: empty authority code");
        }
        let (authority, id) = match code.split_once(':') {
            Some((a, i)) if !a.is_empty() && i.chars().all(|c| c.is_ascii_digit()) => (a, i),
            _ => bail!("CRS: malformed authority code '{}', expected AUTHORITY:ID", code),
        };
        let normalized = format!("{}:{}", authority.to_ascii_uppercase(), id);
        let wkt = match normalized.as_str() {
            "EPSG:4326" => WGS84_WKT.to_string(),
            "EPSG:3857" => WEB_MERCATOR_WKT.to_string(),
            _ => {
                tracing::debug!("CRS: no builtin WKT definition for {}", normalized);
                String::new()
            }
        };
        Ok(Self {
            code: normalized,
            wkt,
        })
    }

    pub fn wgs84() -> Self {
        Self {
            code: WGS84_CODE.to_string(),
            wkt: WGS84_WKT.to_string(),
        }
    }

    /// Two references match when their normalized authority codes agree.
    pub fn matches(&self, other: &CrsRef) -> bool {
        self.code.eq_ignore_ascii_case(&other.code)
    }
}
