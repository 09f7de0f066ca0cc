//! lot_scan - whole-video plate analysis
//!
//! Batch counterpart to the live gate: no barrier, no cooldown. Votes
//! accumulate across the entire pass (window 40, min support 5) and every
//! plate that stabilizes is reported once, in order of first consensus.
//!
//! As with `gated`, the scripted inference stubs are wired here; deployments
//! embed `BatchScanner` with real backends.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;

use gate_kernel::ui::{Ui, UiMode};
use gate_kernel::{
    BatchScanner, ConsensusVoter, FileSource, FrameSource, PipelineSettings, PlateValidator,
    ScriptedDetector, ScriptedRecognizer, VideoConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video source URL (only stub:// is built in).
    #[arg(long, default_value = "stub://recorded_lane")]
    video: String,
    /// Number of synthetic frames to scan.
    #[arg(long, default_value_t = 300)]
    frames: u64,
    /// Process 1 of every N frames.
    #[arg(long, default_value_t = 1)]
    every: u32,
    /// Detector confidence floor.
    #[arg(long, default_value_t = 0.5)]
    confidence: f32,
    /// Progress output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mode = match args.ui.as_str() {
        "plain" => UiMode::Plain,
        "pretty" => UiMode::Pretty,
        _ => UiMode::Auto,
    };
    let ui = Ui::new(mode, std::io::IsTerminal::is_terminal(&std::io::stderr()));

    let mut source = FileSource::new(VideoConfig {
        url: args.video,
        ..VideoConfig::default()
    })?
    .with_frame_limit(args.frames);
    source.connect()?;

    let mut scanner = BatchScanner::new(
        Arc::new(Mutex::new(ScriptedDetector::new())),
        Arc::new(Mutex::new(ScriptedRecognizer::new())),
        PlateValidator::default(),
        ConsensusVoter::batch(),
        PipelineSettings {
            sample_every_n_frames: args.every,
            detector_confidence_threshold: args.confidence,
        },
    )?;

    let progress = ui.scan_progress(args.frames);
    let mut plates = Vec::new();
    while let Some(frame) = source.next_frame()? {
        if let Some(plate) = scanner.scan_frame(&frame)? {
            plates.push(plate);
        }
        progress.frame_done(plates.len());
    }
    progress.finish();

    if plates.is_empty() {
        println!("no plates stabilized");
    } else {
        println!("plates (in order of first consensus):");
        for plate in &plates {
            println!("  {plate}");
        }
    }
    Ok(())
}
