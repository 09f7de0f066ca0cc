//! ANPR gate kernel.
//!
//! Turns an unreliable, frame-by-frame signal (detector boxes + OCR strings,
//! each independently error-prone) into a small number of exactly-once
//! real-world actions: open the barrier, move a capacity-bounded occupancy
//! counter.
//!
//! # Pipeline
//!
//! capture → sample → detect → crop → recognize → validate → vote → gate
//!
//! - `frame`: pixel buffers, clamped detection boxes, crops
//! - `ingest`: frame sources (`stub://` synthetic built in)
//! - `detect` / `recognize`: external inference boundaries
//! - `validate`: plate grammar + fallback heuristic
//! - `vote`: bounded-window consensus over noisy readings
//! - `gate`: SEARCHING/COOLDOWN state machine, exactly-once decisions
//! - `registration` / `occupancy`: SQLite-backed stores with in-memory twins
//! - `pipeline`: the sequential per-frame loop (live) and batch scanner
//! - `config`: file + env configuration for the bins

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};

pub mod config;
pub mod detect;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod occupancy;
pub mod pipeline;
pub mod recognize;
pub mod registration;
pub mod ui;
pub mod validate;
pub mod vote;

pub use detect::{DetectorBackend, RawDetection, ScriptedDetector};
pub use frame::{Detection, DetectionBox, Frame};
pub use gate::{GateDecision, GateState, OccupancyGate};
pub use ingest::{FileSource, FrameSource, VideoConfig};
pub use occupancy::{
    InMemoryOccupancyStore, OccupancyStore, ParkingResource, ParkingSpot, SqliteOccupancyStore,
    StoreUpdate,
};
pub use pipeline::{
    BatchScanner, DisplaySink, FrameSampler, LogSink, Pipeline, PipelineSettings, RunSummary,
    StatusColor, StatusUpdate,
};
pub use recognize::{PlateCandidate, Recognizer, ScriptedRecognizer};
pub use registration::{InMemoryRegistry, RegistrationLookup, SqliteRegistry};
pub use validate::{normalize, PlateValidator, ValidatedPlate};
pub use vote::{ConsensusVoter, EmptyFramePolicy};

/// Unique shared-memory SQLite URI, so concurrent tests can hit one database
/// through independent connections.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:gate_kernel_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}
