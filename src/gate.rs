//! Barrier decision state machine.
//!
//! Converts a consensus plate into exactly one real-world action. Two states:
//!
//! - `Searching`: consensus decisions are evaluated against the registry and
//!   the occupancy store.
//! - `Cooldown { until }`: a grant opened the barrier; until the deadline no
//!   detection, recognition, or voting happens at all. Models the physical
//!   open/close cycle and prevents double-counting the admitted vehicle.
//!
//! Every method takes `now` explicitly so tests drive simulated time.
//!
//! Failure posture is fail-closed: a registry error reads as "not
//! registered"; an indeterminate store response never grants and never starts
//! a cooldown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::occupancy::OccupancyStore;
use crate::registration::RegistrationLookup;
use crate::validate::ValidatedPlate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Searching,
    Cooldown { until: Instant },
}

/// Outcome of evaluating one consensus plate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Registered and admitted; barrier opens, cooldown starts.
    Granted {
        plate: ValidatedPlate,
        occupancy: u32,
    },
    /// Not registered (or registry unreachable, which reads the same).
    /// The voter keeps its window so the plate is re-evaluated if it reaches
    /// consensus again.
    DeniedUnknown { plate: ValidatedPlate },
    /// Registered but the resource is at capacity. The voter window resets
    /// so the same plate does not hammer a full resource every frame.
    DeniedFull { occupancy: u32 },
    /// The store gave no usable answer. Retry-eligible; no cooldown.
    Unavailable {
        plate: ValidatedPlate,
        reason: String,
    },
}

impl GateDecision {
    /// Whether the pipeline should clear the consensus window after acting
    /// on this decision.
    pub fn resets_voter(&self) -> bool {
        matches!(
            self,
            GateDecision::Granted { .. } | GateDecision::DeniedFull { .. }
        )
    }
}

pub struct OccupancyGate {
    registry: Arc<dyn RegistrationLookup>,
    store: Arc<dyn OccupancyStore>,
    resource_id: String,
    cooldown: Duration,
    state: GateState,
}

impl OccupancyGate {
    pub fn new(
        registry: Arc<dyn RegistrationLookup>,
        store: Arc<dyn OccupancyStore>,
        resource_id: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            resource_id: resource_id.into(),
            cooldown,
            state: GateState::Searching,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// True while a grant's cooldown is active. Expiry transitions back to
    /// `Searching` as a side effect.
    pub fn is_cooling(&mut self, now: Instant) -> bool {
        match self.state {
            GateState::Searching => false,
            GateState::Cooldown { until } => {
                if now >= until {
                    self.state = GateState::Searching;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Remaining cooldown, for display.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            GateState::Cooldown { until } if until > now => Some(until - now),
            _ => None,
        }
    }

    /// Evaluate a consensus plate. Callers only invoke this in `Searching`;
    /// the pipeline short-circuits the whole recognition path during
    /// cooldown.
    pub fn on_consensus(&mut self, plate: ValidatedPlate, now: Instant) -> GateDecision {
        let registered = match self.registry.is_registered(&plate) {
            Ok(registered) => registered,
            Err(e) => {
                // Fail closed: an unreachable registry denies.
                log::warn!("registration lookup failed for {}: {:#}", plate, e);
                false
            }
        };

        if !registered {
            log::info!("plate {} not registered, gate stays closed", plate);
            return GateDecision::DeniedUnknown { plate };
        }

        match self.store.try_enter(&self.resource_id) {
            Ok(update) if update.ok => {
                log::info!(
                    "barrier opening for {} ({} now occupies {})",
                    plate,
                    self.resource_id,
                    update.occupancy
                );
                self.state = GateState::Cooldown {
                    until: now + self.cooldown,
                };
                GateDecision::Granted {
                    plate,
                    occupancy: update.occupancy,
                }
            }
            Ok(update) => {
                log::info!(
                    "{} is full ({} occupied), denying {}",
                    self.resource_id,
                    update.occupancy,
                    plate
                );
                GateDecision::DeniedFull {
                    occupancy: update.occupancy,
                }
            }
            Err(e) => {
                log::error!("occupancy store failed for {}: {:#}", self.resource_id, e);
                GateDecision::Unavailable {
                    plate,
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::{InMemoryOccupancyStore, ParkingResource, StoreUpdate};
    use crate::registration::{InMemoryRegistry, UnavailableRegistry};
    use anyhow::anyhow;

    const LOT: &str = "main_lot";

    fn store_with(capacity: u32, occupancy: u32) -> Arc<InMemoryOccupancyStore> {
        let store = Arc::new(InMemoryOccupancyStore::new());
        store
            .provision_resource(&ParkingResource {
                id: LOT.to_string(),
                name: "Merkez Otopark".to_string(),
                total_capacity: capacity,
                current_occupancy: occupancy,
            })
            .unwrap();
        store
    }

    fn plate(text: &str) -> ValidatedPlate {
        ValidatedPlate::for_tests(text)
    }

    #[test]
    fn grant_starts_cooldown_and_increments() {
        let store = store_with(100, 50);
        let registry = Arc::new(InMemoryRegistry::with_plates(["34ABC123"]));
        let mut gate = OccupancyGate::new(registry, store.clone(), LOT, Duration::from_secs(15));

        let t0 = Instant::now();
        let decision = gate.on_consensus(plate("34ABC123"), t0);
        assert_eq!(
            decision,
            GateDecision::Granted {
                plate: plate("34ABC123"),
                occupancy: 51
            }
        );
        assert!(decision.resets_voter());

        assert!(gate.is_cooling(t0 + Duration::from_secs(14)));
        assert!(!gate.is_cooling(t0 + Duration::from_secs(15)));
        assert_eq!(gate.state(), GateState::Searching);
    }

    #[test]
    fn unregistered_plate_never_touches_store() {
        let store = store_with(100, 50);
        let registry = Arc::new(InMemoryRegistry::new());
        let mut gate = OccupancyGate::new(registry, store.clone(), LOT, Duration::from_secs(15));

        let decision = gate.on_consensus(plate("34ABC123"), Instant::now());
        assert_eq!(
            decision,
            GateDecision::DeniedUnknown {
                plate: plate("34ABC123")
            }
        );
        assert!(!decision.resets_voter());
        assert_eq!(gate.state(), GateState::Searching);
        assert_eq!(store.resource(LOT).unwrap().current_occupancy, 50);
    }

    #[test]
    fn registry_failure_reads_as_unregistered() {
        let store = store_with(100, 50);
        let mut gate = OccupancyGate::new(
            Arc::new(UnavailableRegistry),
            store.clone(),
            LOT,
            Duration::from_secs(15),
        );

        let decision = gate.on_consensus(plate("34ABC123"), Instant::now());
        assert!(matches!(decision, GateDecision::DeniedUnknown { .. }));
        assert_eq!(store.resource(LOT).unwrap().current_occupancy, 50);
    }

    #[test]
    fn full_lot_denies_without_cooldown() {
        let store = store_with(1, 1);
        let registry = Arc::new(InMemoryRegistry::with_plates(["34ABC123"]));
        let mut gate = OccupancyGate::new(registry, store, LOT, Duration::from_secs(15));

        let t0 = Instant::now();
        let decision = gate.on_consensus(plate("34ABC123"), t0);
        assert_eq!(decision, GateDecision::DeniedFull { occupancy: 1 });
        assert!(decision.resets_voter());
        assert!(!gate.is_cooling(t0));
    }

    struct FailingStore;

    impl OccupancyStore for FailingStore {
        fn try_enter(&self, _: &str) -> anyhow::Result<StoreUpdate> {
            Err(anyhow!("connection refused"))
        }
        fn try_exit(&self, _: &str) -> anyhow::Result<StoreUpdate> {
            Err(anyhow!("connection refused"))
        }
        fn resource(&self, _: &str) -> anyhow::Result<ParkingResource> {
            Err(anyhow!("connection refused"))
        }
        fn provision_resource(&self, _: &ParkingResource) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
        fn provision_spot(&self, _: &crate::occupancy::ParkingSpot) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
        fn first_empty_spot(&self) -> anyhow::Result<Option<crate::occupancy::ParkingSpot>> {
            Err(anyhow!("connection refused"))
        }
        fn set_spot_occupied(&self, _: &str, _: bool) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn store_failure_never_starts_cooldown() {
        let registry = Arc::new(InMemoryRegistry::with_plates(["34ABC123"]));
        let mut gate = OccupancyGate::new(
            registry,
            Arc::new(FailingStore),
            LOT,
            Duration::from_secs(15),
        );

        let t0 = Instant::now();
        let decision = gate.on_consensus(plate("34ABC123"), t0);
        assert!(matches!(decision, GateDecision::Unavailable { .. }));
        assert!(!decision.resets_voter());
        assert!(!gate.is_cooling(t0));
    }
}
