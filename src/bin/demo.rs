//! demo - end-to-end synthetic run of the gate pipeline
//!
//! Provisions an in-memory lot one space short of full, scripts the detector
//! and recognizer through three acts, and drives the pipeline on a simulated
//! clock (frame N occurs at N/fps seconds):
//!
//! 1. A registered plate stabilizes and is admitted; the lot fills and the
//!    cooldown suppresses all inference while the barrier cycles.
//! 2. After the cooldown, a second registered plate is refused: lot full.
//! 3. An unregistered plate reaches consensus and is turned away.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;

use gate_kernel::ui::{Ui, UiMode};
use gate_kernel::{
    ConsensusVoter, EmptyFramePolicy, FileSource, FrameSource, GateDecision, InMemoryOccupancyStore,
    InMemoryRegistry, LogSink, OccupancyGate, OccupancyStore, ParkingResource, ParkingSpot,
    Pipeline, PipelineSettings, PlateValidator, ScriptedDetector, ScriptedRecognizer, VideoConfig,
};

const LOT: &str = "main_lot";
const ADMITTED_PLATE: &str = "34 ABC 123";
const REFUSED_PLATE: &str = "06 DEF 456";
const UNKNOWN_PLATE: &str = "06 KL 042";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Synthetic frames to run.
    #[arg(long, default_value_t = 90)]
    frames: u64,
    /// Simulated capture rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Barrier cooldown in simulated seconds.
    #[arg(long, default_value_t = 2)]
    cooldown: u64,
    /// Progress output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let mode = match args.ui.as_str() {
        "plain" => UiMode::Plain,
        "pretty" => UiMode::Pretty,
        _ => UiMode::Auto,
    };
    let ui = Ui::new(mode, std::io::IsTerminal::is_terminal(&std::io::stderr()));

    let store = Arc::new(InMemoryOccupancyStore::new());
    let registry;
    {
        let _stage = ui.stage("provision lot, spots, plates");
        store.provision_resource(&ParkingResource {
            id: LOT.to_string(),
            name: "Central Lot".to_string(),
            total_capacity: 2,
            current_occupancy: 1,
        })?;
        store.provision_spot(&ParkingSpot {
            id: "spot_A1".to_string(),
            name: "A-1 (near entrance)".to_string(),
            lat: 41.085,
            lng: 29.045,
            occupied: false,
        })?;
        registry = Arc::new(InMemoryRegistry::with_plates([
            ADMITTED_PLATE,
            REFUSED_PLATE,
        ]));
    }

    let detector = Arc::new(Mutex::new(ScriptedDetector::new()));
    let recognizer = Arc::new(Mutex::new(ScriptedRecognizer::new()));
    {
        let _stage = ui.stage("script detector + recognizer");
        let mut det = detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        let mut rec = recognizer
            .lock()
            .map_err(|_| anyhow!("recognizer lock poisoned"))?;
        // Act 1: three clean readings of the admitted plate.
        for _ in 0..3 {
            det.push_plate_box(0.9);
            rec.push_reading(ADMITTED_PLATE, 0.85);
        }
        // Act 2 (after the cooldown): a second registered vehicle, lot full.
        for _ in 0..3 {
            det.push_plate_box(0.9);
            rec.push_reading(REFUSED_PLATE, 0.8);
        }
        // Act 3: an unregistered plate.
        for _ in 0..3 {
            det.push_plate_box(0.9);
            rec.push_reading(UNKNOWN_PLATE, 0.75);
        }
    }

    let gate = OccupancyGate::new(
        registry,
        store.clone(),
        LOT,
        Duration::from_secs(args.cooldown),
    );
    let mut pipeline = Pipeline::new(
        detector,
        recognizer,
        PlateValidator::default(),
        ConsensusVoter::new(5, 3, EmptyFramePolicy::Reset),
        gate,
        PipelineSettings {
            sample_every_n_frames: 1,
            detector_confidence_threshold: 0.5,
        },
        Box::new(LogSink::default()),
    )?;

    let mut source = FileSource::new(VideoConfig {
        url: "stub://demo_lane".to_string(),
        target_fps: args.fps,
        ..VideoConfig::default()
    })?
    .with_frame_limit(args.frames);
    source.connect()?;

    let frame_period = Duration::from_secs(1) / args.fps;
    let t0 = Instant::now();
    let mut decisions = Vec::new();
    {
        let _stage = ui.stage("run pipeline on simulated clock");
        while let Some(frame) = source.next_frame()? {
            let now = t0 + frame_period * frame.seq as u32;
            if let Some(decision) = pipeline.process_frame(&frame, now)? {
                decisions.push((frame.seq, decision));
            }
        }
    }

    println!("decisions:");
    for (seq, decision) in &decisions {
        match decision {
            GateDecision::Granted { plate, occupancy } => {
                println!("  frame {seq}: GRANTED {plate} (occupancy {occupancy})")
            }
            GateDecision::DeniedUnknown { plate } => {
                println!("  frame {seq}: DENIED {plate} (unregistered)")
            }
            GateDecision::DeniedFull { occupancy } => {
                println!("  frame {seq}: DENIED (lot full at {occupancy})")
            }
            GateDecision::Unavailable { plate, reason } => {
                println!("  frame {seq}: UNAVAILABLE for {plate}: {reason}")
            }
        }
    }

    let resource = store.resource(LOT)?;
    println!(
        "final occupancy: {}/{}",
        resource.current_occupancy, resource.total_capacity
    );
    if let Some(spot) = store.first_empty_spot()? {
        println!("first empty spot: {} ({})", spot.id, spot.name);
    }
    Ok(())
}
