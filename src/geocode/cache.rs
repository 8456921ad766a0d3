//! Persistent address → result cache backed by SQLite.
//!
//! One table per provider in a single database file under the per-user
//! application-data directory, so the cache survives process restarts.
//! Cache failures never propagate: a cache that cannot be opened or
//! provisioned runs permanently disabled, answering every lookup with a
//! miss and dropping every store.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::GeocodeResult;

/// Addresses longer than this are never cached; bounds the key size.
pub const MAX_ADDRESS_LEN: usize = 255;

pub struct GeocodingCache {
    /// `None` when the cache is disabled. The mutex also serializes the
    /// upsert so concurrent writers of the same address cannot race.
    conn: Mutex<Option<Connection>>,
    table: String,
}

impl GeocodingCache {
    /// Open the cache for a provider at the default per-user location.
    pub fn open(provider: &str) -> Self {
        match default_path() {
            Some(path) => Self::open_at(&path, provider),
            None => {
                tracing::warn!("GeocodingCache: no application data directory, cache disabled");
                Self::disabled(provider)
            }
        }
    }

    /// Open the cache at an explicit database path.
    pub fn open_at(path: &Path, provider: &str) -> Self {
        let table = table_name(provider);
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!("GeocodingCache: cannot create {:?}: {}, cache disabled", parent, e);
            return Self::disabled(provider);
        }

        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("GeocodingCache: cannot open {:?}: {}, cache disabled", path, e);
                return Self::disabled(provider);
            }
        };

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (address TEXT PRIMARY KEY, result BLOB)",
            table
        );
        if let Err(e) = conn.execute(&ddl, []) {
            tracing::warn!("GeocodingCache: cannot provision table: {}, cache disabled", e);
            return Self::disabled(provider);
        }

        Self {
            conn: Mutex::new(Some(conn)),
            table,
        }
    }

    fn disabled(provider: &str) -> Self {
        Self {
            conn: Mutex::new(None),
            table: table_name(provider),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Exact-match lookup. Misses on: disabled cache, over-long address,
    /// absent row, or a stored result that no longer deserializes (which
    /// also truncates the table, so a stale format self-heals).
    pub fn lookup(&self, address: &str) -> Option<GeocodeResult> {
        if address.len() > MAX_ADDRESS_LEN {
            return None;
        }
        let guard = self.conn.lock().ok()?;
        let conn = guard.as_ref()?;

        let sql = format!("SELECT result FROM {} WHERE address = ?1", self.table);
        let blob: Option<Vec<u8>> = match conn
            .query_row(&sql, params![address], |row| row.get(0))
            .optional()
        {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("GeocodingCache: lookup failed: {}", e);
                return None;
            }
        };
        let blob = blob?;

        match serde_json::from_slice(&blob) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(
                    "GeocodingCache: stored result no longer deserializes ({}), truncating cache",
                    e
                );
                if let Err(e) = conn.execute(&format!("DELETE FROM {}", self.table), []) {
                    tracing::warn!("GeocodingCache: truncate failed: {}", e);
                }
                None
            }
        }
    }

    /// Insert or overwrite the cached result for an address. A no-op for a
    /// disabled cache or an over-long address; errors are logged, not
    /// returned.
    pub fn store(&self, address: &str, result: &GeocodeResult) {
        if address.len() > MAX_ADDRESS_LEN {
            return;
        }
        let Ok(guard) = self.conn.lock() else {
            return;
        };
        let Some(conn) = guard.as_ref() else {
            return;
        };

        let blob = match serde_json::to_vec(result) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("GeocodingCache: cannot serialize result: {}", e);
                return;
            }
        };

        let sql = format!(
            "INSERT INTO {} (address, result) VALUES (?1, ?2) \
             ON CONFLICT(address) DO UPDATE SET result = excluded.result",
            self.table
        );
        if let Err(e) = conn.execute(&sql, params![address, blob]) {
            tracing::warn!("GeocodingCache: store failed: {}", e);
        }
    }

    /// Empty the provider's table without deleting the database file.
    pub fn clear(&self) {
        let Ok(guard) = self.conn.lock() else {
            return;
        };
        let Some(conn) = guard.as_ref() else {
            return;
        };
        if let Err(e) = conn.execute(&format!("DELETE FROM {}", self.table), []) {
            tracing::warn!("GeocodingCache: clear failed: {}", e);
        }
    }
}

/// Database file under the per-user application-data directory.
pub fn default_path() -> Option<PathBuf> {
    Some(dirs_next::data_dir()?.join("geotable").join("geocode.sqlite"))
}

fn table_name(provider: &str) -> String {
    let sanitized: String = provider
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("cache_{}", sanitized)
}
