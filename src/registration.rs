//! Registered-plate lookup.
//!
//! The gate asks exactly one question of this store: is a normalized plate
//! registered to a known owner? Lookup failures are surfaced as errors; the
//! gate treats them as "not registered" (fail closed), never as a grant.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::open_db_connection;
use crate::validate::ValidatedPlate;

pub trait RegistrationLookup: Send + Sync {
    fn is_registered(&self, plate: &ValidatedPlate) -> Result<bool>;
}

// ----------------------------------------------------------------------------
// SQLite registry
// ----------------------------------------------------------------------------

pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = open_db_connection(db_path)?;
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.ensure_schema()?;
        Ok(registry)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS registered_plates (
              plate TEXT PRIMARY KEY,
              owner TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("registry lock poisoned"))
    }

    /// Register a plate to an owner. Plates are stored normalized, so the
    /// gate's lookup is a single exact-match query.
    pub fn register(&self, plate: &str, owner: &str) -> Result<()> {
        let normalized = crate::validate::normalize(plate);
        if normalized.is_empty() {
            return Err(anyhow!("cannot register an empty plate"));
        }
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO registered_plates (plate, owner) VALUES (?1, ?2)",
            params![normalized, owner],
        )?;
        Ok(())
    }
}

impl RegistrationLookup for SqliteRegistry {
    fn is_registered(&self, plate: &ValidatedPlate) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM registered_plates WHERE plate = ?1",
            params![plate.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

// ----------------------------------------------------------------------------
// In-memory registry (tests, demo)
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRegistry {
    plates: Mutex<HashSet<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plates<I: IntoIterator<Item = S>, S: AsRef<str>>(plates: I) -> Self {
        let registry = Self::new();
        {
            let mut set = registry.plates.lock().unwrap();
            for plate in plates {
                set.insert(crate::validate::normalize(plate.as_ref()));
            }
        }
        registry
    }
}

impl RegistrationLookup for InMemoryRegistry {
    fn is_registered(&self, plate: &ValidatedPlate) -> Result<bool> {
        let plates = self
            .plates
            .lock()
            .map_err(|_| anyhow!("registry lock poisoned"))?;
        Ok(plates.contains(plate.as_str()))
    }
}

/// A lookup that always fails. Stands in for an unreachable backend in
/// fail-closed tests.
pub struct UnavailableRegistry;

impl RegistrationLookup for UnavailableRegistry {
    fn is_registered(&self, _plate: &ValidatedPlate) -> Result<bool> {
        Err(anyhow!("registration backend unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_registry_round_trip() {
        let registry = SqliteRegistry::open(&crate::shared_memory_uri()).unwrap();
        registry.register("34 abc 123", "demo-user").unwrap();

        let known = ValidatedPlate::for_tests("34ABC123");
        let unknown = ValidatedPlate::for_tests("06XYZ42");
        assert!(registry.is_registered(&known).unwrap());
        assert!(!registry.is_registered(&unknown).unwrap());
    }

    #[test]
    fn empty_plate_rejected() {
        let registry = SqliteRegistry::open(&crate::shared_memory_uri()).unwrap();
        assert!(registry.register("   ", "demo-user").is_err());
    }
}
