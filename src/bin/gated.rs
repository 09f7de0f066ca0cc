//! gated - live ANPR gate daemon
//!
//! One lane, one sequential pipeline:
//! 1. Ingests frames from the configured source
//! 2. Samples 1 of every N frames through detect → recognize → validate
//! 3. Votes readings into a consensus plate
//! 4. Checks registration and drives the capacity-bounded occupancy counter
//! 5. Holds a cooldown while the barrier cycles
//!
//! Detection and recognition models are deployment integration points;
//! this binary wires the built-in scripted stubs, which is enough for smoke
//! runs against a `stub://` source. Real deployments embed `Pipeline` with
//! their own `DetectorBackend`/`Recognizer` implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use gate_kernel::config::GateConfig;
use gate_kernel::{
    FileSource, FrameSource, LogSink, OccupancyGate, OccupancyStore, Pipeline, ScriptedDetector,
    ScriptedRecognizer, SqliteOccupancyStore, SqliteRegistry,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = GateConfig::load()?;

    let store = Arc::new(SqliteOccupancyStore::open(&cfg.db_path)?);
    let registry = Arc::new(SqliteRegistry::open(&cfg.db_path)?);

    // Fail before the loop if nothing was provisioned; otherwise every
    // consensus decision would just bounce off the store.
    let resource = store.resource(&cfg.resource_id).with_context(|| {
        format!(
            "resource '{}' missing from {} (run `provision init-lot` first)",
            cfg.resource_id, cfg.db_path
        )
    })?;
    log::info!(
        "gating '{}': {}/{} occupied",
        resource.name,
        resource.current_occupancy,
        resource.total_capacity
    );

    let mut source = FileSource::new(cfg.video.clone())?;
    source.connect()?;

    let gate = OccupancyGate::new(registry, store, cfg.resource_id.clone(), cfg.cooldown);
    let mut pipeline = Pipeline::new(
        Arc::new(Mutex::new(ScriptedDetector::new())),
        Arc::new(Mutex::new(ScriptedRecognizer::new())),
        cfg.validator(),
        cfg.streaming_voter(),
        gate,
        cfg.pipeline_settings(),
        Box::new(LogSink::default()),
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("stop requested, finishing current frame");
        stop_handler.store(true, Ordering::Relaxed);
    })?;

    log::info!(
        "gated running: source={}, sample 1/{} frames, cooldown {}s",
        cfg.video.url,
        cfg.sample_every_n_frames,
        cfg.cooldown.as_secs()
    );

    let summary = pipeline.run(&mut source, &stop)?;
    log::info!(
        "stream ended: {} frames ({} processed), {} granted, {} unregistered, {} full, {} store errors",
        summary.frames_seen,
        summary.frames_processed,
        summary.granted,
        summary.denied_unknown,
        summary.denied_full,
        summary.unavailable
    );
    Ok(())
}
