//! Capacity invariant under concurrent callers: multiple lanes sharing one
//! lot must never overshoot capacity or undershoot zero, and successful
//! enters minus successful exits must equal the net occupancy change.

use std::sync::Arc;
use std::thread;

use gate_kernel::{
    InMemoryOccupancyStore, OccupancyStore, ParkingResource, SqliteOccupancyStore,
};

const LOT: &str = "main_lot";

fn provision(store: &dyn OccupancyStore, capacity: u32, occupancy: u32) {
    store
        .provision_resource(&ParkingResource {
            id: LOT.to_string(),
            name: "Central Lot".to_string(),
            total_capacity: capacity,
            current_occupancy: occupancy,
        })
        .unwrap();
}

fn stores() -> (tempfile::TempDir, Vec<Arc<dyn OccupancyStore>>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("occupancy.db");
    let sqlite = SqliteOccupancyStore::open(path.to_str().unwrap()).unwrap();
    (
        dir,
        vec![Arc::new(InMemoryOccupancyStore::new()), Arc::new(sqlite)],
    )
}

#[test]
fn concurrent_enters_never_overshoot_capacity() {
    let (_dir, stores) = stores();
    for store in stores {
        provision(store.as_ref(), 50, 0);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..100 {
                    let update = store.try_enter(LOT).unwrap();
                    assert!(update.occupancy <= 50);
                    if update.ok {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total_admitted: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total_admitted, 50);
        assert_eq!(store.resource(LOT).unwrap().current_occupancy, 50);
    }
}

#[test]
fn concurrent_exits_never_undershoot_zero() {
    let (_dir, stores) = stores();
    for store in stores {
        provision(store.as_ref(), 100, 30);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                let mut released = 0u32;
                for _ in 0..50 {
                    let update = store.try_exit(LOT).unwrap();
                    if update.ok {
                        released += 1;
                    }
                }
                released
            }));
        }

        let total_released: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total_released, 30);
        assert_eq!(store.resource(LOT).unwrap().current_occupancy, 0);
    }
}

#[test]
fn mixed_traffic_accounting_balances() {
    let (_dir, stores) = stores();
    for store in stores {
        provision(store.as_ref(), 20, 10);

        let mut handles = Vec::new();
        for lane in 0..6 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                let mut enters = 0i64;
                let mut exits = 0i64;
                for i in 0..200 {
                    if (i + lane) % 2 == 0 {
                        if store.try_enter(LOT).unwrap().ok {
                            enters += 1;
                        }
                    } else if store.try_exit(LOT).unwrap().ok {
                        exits += 1;
                    }
                }
                (enters, exits)
            }));
        }

        let mut enters = 0i64;
        let mut exits = 0i64;
        for handle in handles {
            let (e, x) = handle.join().unwrap();
            enters += e;
            exits += x;
        }

        let resource = store.resource(LOT).unwrap();
        assert!(resource.current_occupancy <= resource.total_capacity);
        assert_eq!(
            enters - exits,
            resource.current_occupancy as i64 - 10,
            "successful enters minus exits must equal the net occupancy change"
        );
    }
}
