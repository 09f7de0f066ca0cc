//! Capacity-bounded occupancy store.
//!
//! The counter a granted entry mutates. The contract is atomic-or-nothing:
//! `try_enter` increments only while `current < total`, `try_exit` decrements
//! only while `current > 0`, each as one indivisible operation. A read
//! followed by a separate write is not an acceptable implementation; two
//! lanes sharing a lot would overshoot capacity.
//!
//! Two implementations:
//! - `SqliteOccupancyStore`: conditional UPDATE inside an immediate
//!   transaction on a mutex-guarded connection. Safe for concurrent pipeline
//!   instances sharing one database.
//! - `InMemoryOccupancyStore`: mutex-guarded map, used by tests and the demo.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::open_db_connection;

/// A lot or an individual spot group with a bounded counter.
/// Invariant: `0 <= current_occupancy <= total_capacity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingResource {
    pub id: String,
    pub name: String,
    pub total_capacity: u32,
    pub current_occupancy: u32,
}

/// A mapped parking spot. Provisioned once, flipped by occupancy sensors or
/// operators; the gate itself only reads these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub occupied: bool,
}

/// Outcome of one conditional transition. `occupancy` is the post-transition
/// count on success, the unchanged count on refusal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreUpdate {
    pub ok: bool,
    pub occupancy: u32,
}

pub trait OccupancyStore: Send + Sync {
    /// Atomically increment occupancy if below capacity.
    fn try_enter(&self, resource_id: &str) -> Result<StoreUpdate>;

    /// Atomically decrement occupancy if above zero.
    fn try_exit(&self, resource_id: &str) -> Result<StoreUpdate>;

    fn resource(&self, resource_id: &str) -> Result<ParkingResource>;

    /// Create or overwrite a resource row.
    fn provision_resource(&self, resource: &ParkingResource) -> Result<()>;

    /// Create or overwrite a spot row.
    fn provision_spot(&self, spot: &ParkingSpot) -> Result<()>;

    /// First unoccupied spot in id order, if any.
    fn first_empty_spot(&self) -> Result<Option<ParkingSpot>>;

    fn set_spot_occupied(&self, spot_id: &str, occupied: bool) -> Result<()>;
}

// ----------------------------------------------------------------------------
// SQLite store
// ----------------------------------------------------------------------------

pub struct SqliteOccupancyStore {
    conn: Mutex<Connection>,
}

impl SqliteOccupancyStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = open_db_connection(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS parking_resources (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              total_capacity INTEGER NOT NULL,
              current_occupancy INTEGER NOT NULL,
              CHECK (current_occupancy >= 0),
              CHECK (current_occupancy <= total_capacity)
            );

            CREATE TABLE IF NOT EXISTS parking_spots (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              lat REAL NOT NULL,
              lng REAL NOT NULL,
              is_occupied INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("occupancy store lock poisoned"))
    }

    fn transition(&self, resource_id: &str, update_sql: &str) -> Result<StoreUpdate> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ok = tx.execute(update_sql, params![resource_id])? > 0;
        let occupancy: Option<u32> = tx
            .query_row(
                "SELECT current_occupancy FROM parking_resources WHERE id = ?1",
                params![resource_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;

        let occupancy =
            occupancy.ok_or_else(|| anyhow!("resource '{}' not provisioned", resource_id))?;
        Ok(StoreUpdate { ok, occupancy })
    }
}

impl OccupancyStore for SqliteOccupancyStore {
    fn try_enter(&self, resource_id: &str) -> Result<StoreUpdate> {
        self.transition(
            resource_id,
            "UPDATE parking_resources
             SET current_occupancy = current_occupancy + 1
             WHERE id = ?1 AND current_occupancy < total_capacity",
        )
    }

    fn try_exit(&self, resource_id: &str) -> Result<StoreUpdate> {
        self.transition(
            resource_id,
            "UPDATE parking_resources
             SET current_occupancy = current_occupancy - 1
             WHERE id = ?1 AND current_occupancy > 0",
        )
    }

    fn resource(&self, resource_id: &str) -> Result<ParkingResource> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, total_capacity, current_occupancy
             FROM parking_resources WHERE id = ?1",
            params![resource_id],
            |row| {
                Ok(ParkingResource {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    total_capacity: row.get(2)?,
                    current_occupancy: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| anyhow!("resource '{}' not provisioned", resource_id))
    }

    fn provision_resource(&self, resource: &ParkingResource) -> Result<()> {
        if resource.current_occupancy > resource.total_capacity {
            return Err(anyhow!(
                "resource '{}': initial occupancy {} exceeds capacity {}",
                resource.id,
                resource.current_occupancy,
                resource.total_capacity
            ));
        }
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO parking_resources
             (id, name, total_capacity, current_occupancy)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                resource.id,
                resource.name,
                resource.total_capacity,
                resource.current_occupancy
            ],
        )?;
        Ok(())
    }

    fn provision_spot(&self, spot: &ParkingSpot) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO parking_spots (id, name, lat, lng, is_occupied)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![spot.id, spot.name, spot.lat, spot.lng, spot.occupied],
        )?;
        Ok(())
    }

    fn first_empty_spot(&self) -> Result<Option<ParkingSpot>> {
        let conn = self.lock_conn()?;
        let spot = conn
            .query_row(
                "SELECT id, name, lat, lng, is_occupied FROM parking_spots
                 WHERE is_occupied = 0 ORDER BY id ASC LIMIT 1",
                [],
                |row| {
                    Ok(ParkingSpot {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        lat: row.get(2)?,
                        lng: row.get(3)?,
                        occupied: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(spot)
    }

    fn set_spot_occupied(&self, spot_id: &str, occupied: bool) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE parking_spots SET is_occupied = ?2 WHERE id = ?1",
            params![spot_id, occupied],
        )?;
        if changed == 0 {
            return Err(anyhow!("spot '{}' not provisioned", spot_id));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// In-memory store (tests, demo)
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryOccupancyStore {
    resources: Mutex<HashMap<String, ParkingResource>>,
    spots: Mutex<HashMap<String, ParkingSpot>>,
}

impl InMemoryOccupancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_resources(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, ParkingResource>>> {
        self.resources
            .lock()
            .map_err(|_| anyhow!("occupancy store lock poisoned"))
    }

    fn lock_spots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ParkingSpot>>> {
        self.spots
            .lock()
            .map_err(|_| anyhow!("occupancy store lock poisoned"))
    }
}

impl OccupancyStore for InMemoryOccupancyStore {
    fn try_enter(&self, resource_id: &str) -> Result<StoreUpdate> {
        let mut resources = self.lock_resources()?;
        let resource = resources
            .get_mut(resource_id)
            .ok_or_else(|| anyhow!("resource '{}' not provisioned", resource_id))?;
        if resource.current_occupancy < resource.total_capacity {
            resource.current_occupancy += 1;
            Ok(StoreUpdate {
                ok: true,
                occupancy: resource.current_occupancy,
            })
        } else {
            Ok(StoreUpdate {
                ok: false,
                occupancy: resource.current_occupancy,
            })
        }
    }

    fn try_exit(&self, resource_id: &str) -> Result<StoreUpdate> {
        let mut resources = self.lock_resources()?;
        let resource = resources
            .get_mut(resource_id)
            .ok_or_else(|| anyhow!("resource '{}' not provisioned", resource_id))?;
        if resource.current_occupancy > 0 {
            resource.current_occupancy -= 1;
            Ok(StoreUpdate {
                ok: true,
                occupancy: resource.current_occupancy,
            })
        } else {
            Ok(StoreUpdate {
                ok: false,
                occupancy: 0,
            })
        }
    }

    fn resource(&self, resource_id: &str) -> Result<ParkingResource> {
        self.lock_resources()?
            .get(resource_id)
            .cloned()
            .ok_or_else(|| anyhow!("resource '{}' not provisioned", resource_id))
    }

    fn provision_resource(&self, resource: &ParkingResource) -> Result<()> {
        if resource.current_occupancy > resource.total_capacity {
            return Err(anyhow!(
                "resource '{}': initial occupancy {} exceeds capacity {}",
                resource.id,
                resource.current_occupancy,
                resource.total_capacity
            ));
        }
        self.lock_resources()?
            .insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    fn provision_spot(&self, spot: &ParkingSpot) -> Result<()> {
        self.lock_spots()?.insert(spot.id.clone(), spot.clone());
        Ok(())
    }

    fn first_empty_spot(&self) -> Result<Option<ParkingSpot>> {
        let spots = self.lock_spots()?;
        let mut empty: Vec<&ParkingSpot> = spots.values().filter(|s| !s.occupied).collect();
        empty.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(empty.first().map(|s| (*s).clone()))
    }

    fn set_spot_occupied(&self, spot_id: &str, occupied: bool) -> Result<()> {
        let mut spots = self.lock_spots()?;
        let spot = spots
            .get_mut(spot_id)
            .ok_or_else(|| anyhow!("spot '{}' not provisioned", spot_id))?;
        spot.occupied = occupied;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(id: &str, capacity: u32, occupancy: u32) -> ParkingResource {
        ParkingResource {
            id: id.to_string(),
            name: format!("lot {}", id),
            total_capacity: capacity,
            current_occupancy: occupancy,
        }
    }

    fn stores() -> Vec<Box<dyn OccupancyStore>> {
        vec![
            Box::new(InMemoryOccupancyStore::new()),
            Box::new(SqliteOccupancyStore::open(&crate::shared_memory_uri()).unwrap()),
        ]
    }

    #[test]
    fn full_resource_refuses_then_recovers() {
        for store in stores() {
            store.provision_resource(&lot("main_lot", 1, 1)).unwrap();

            let denied = store.try_enter("main_lot").unwrap();
            assert_eq!(
                denied,
                StoreUpdate {
                    ok: false,
                    occupancy: 1
                }
            );

            let exited = store.try_exit("main_lot").unwrap();
            assert_eq!(
                exited,
                StoreUpdate {
                    ok: true,
                    occupancy: 0
                }
            );

            let entered = store.try_enter("main_lot").unwrap();
            assert_eq!(
                entered,
                StoreUpdate {
                    ok: true,
                    occupancy: 1
                }
            );
        }
    }

    #[test]
    fn exit_at_zero_is_refused() {
        for store in stores() {
            store.provision_resource(&lot("main_lot", 5, 0)).unwrap();
            let update = store.try_exit("main_lot").unwrap();
            assert!(!update.ok);
            assert_eq!(update.occupancy, 0);
        }
    }

    #[test]
    fn unknown_resource_is_an_error() {
        for store in stores() {
            assert!(store.try_enter("ghost_lot").is_err());
            assert!(store.resource("ghost_lot").is_err());
        }
    }

    #[test]
    fn provisioning_rejects_overfull_initial_state() {
        for store in stores() {
            assert!(store.provision_resource(&lot("main_lot", 10, 11)).is_err());
        }
    }

    #[test]
    fn first_empty_spot_in_id_order() {
        for store in stores() {
            for (id, occupied) in [("spot_A1", true), ("spot_B1", false), ("spot_C1", false)] {
                store
                    .provision_spot(&ParkingSpot {
                        id: id.to_string(),
                        name: id.to_string(),
                        lat: 41.085,
                        lng: 29.045,
                        occupied,
                    })
                    .unwrap();
            }
            let spot = store.first_empty_spot().unwrap().unwrap();
            assert_eq!(spot.id, "spot_B1");

            store.set_spot_occupied("spot_B1", true).unwrap();
            let spot = store.first_empty_spot().unwrap().unwrap();
            assert_eq!(spot.id, "spot_C1");
        }
    }
}
