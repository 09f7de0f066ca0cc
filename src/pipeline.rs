//! Per-frame orchestration.
//!
//! One sequential loop per lane: capture → sample → detect → crop →
//! recognize → validate → vote → gate. No two frames are in flight at once,
//! so the voter window and the gate state machine never see internal races.
//! The occupancy store is the only shared-mutable state and carries its own
//! synchronization.
//!
//! Two drivers share the stage machinery:
//! - `Pipeline::run`: the live gate. Cooldown short-circuits the whole
//!   recognition path (display only), a stop flag is polled between frames.
//! - `BatchScanner::scan`: whole-video analysis. No gate, no cooldown;
//!   consensus plates are collected once each via a session-level seen set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::detect::DetectorBackend;
use crate::frame::{Detection, DetectionBox, Frame};
use crate::gate::{GateDecision, OccupancyGate};
use crate::ingest::FrameSource;
use crate::recognize::Recognizer;
use crate::validate::{PlateValidator, ValidatedPlate};
use crate::vote::ConsensusVoter;

// ----------------------------------------------------------------------------
// FrameSampler
// ----------------------------------------------------------------------------

/// Fixed-interval frame decimation: process 1 of every `every_n` frames.
/// Pure throughput control, independent of cooldown suppression.
#[derive(Clone, Copy, Debug)]
pub struct FrameSampler {
    every_n: u32,
}

impl FrameSampler {
    pub fn new(every_n: u32) -> Result<Self> {
        if every_n == 0 {
            return Err(anyhow!("sample interval must be >= 1"));
        }
        Ok(Self { every_n })
    }

    pub fn should_process(&self, frame_seq: u64) -> bool {
        frame_seq % self.every_n as u64 == 0
    }
}

// ----------------------------------------------------------------------------
// Presentation sink
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusColor {
    Searching,
    Granted,
    Denied,
}

/// Per-frame status for the rendering layer. Purely observational; nothing
/// feeds back into the pipeline.
#[derive(Clone, Debug)]
pub struct StatusUpdate {
    pub message: String,
    pub color: StatusColor,
    pub occupancy_text: Option<String>,
}

impl StatusUpdate {
    fn searching() -> Self {
        Self {
            message: "SEARCHING FOR VEHICLE".to_string(),
            color: StatusColor::Searching,
            occupancy_text: None,
        }
    }
}

pub trait DisplaySink: Send {
    fn render(&mut self, frame_seq: u64, status: &StatusUpdate);
}

/// Default sink: status transitions go to the log, per-frame repeats are
/// suppressed.
#[derive(Default)]
pub struct LogSink {
    last_message: Option<String>,
}

impl DisplaySink for LogSink {
    fn render(&mut self, frame_seq: u64, status: &StatusUpdate) {
        if self.last_message.as_deref() == Some(status.message.as_str()) {
            return;
        }
        match &status.occupancy_text {
            Some(occupancy) => {
                log::info!("frame {}: {} | {}", frame_seq, status.message, occupancy)
            }
            None => log::info!("frame {}: {}", frame_seq, status.message),
        }
        self.last_message = Some(status.message.clone());
    }
}

// ----------------------------------------------------------------------------
// Live pipeline
// ----------------------------------------------------------------------------

/// Knobs the orchestration layer owns directly. Voter, validator, and gate
/// carry their own configuration.
#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    pub sample_every_n_frames: u32,
    pub detector_confidence_threshold: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_every_n_frames: 3,
            detector_confidence_threshold: 0.5,
        }
    }
}

/// Counters for one streaming run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub frames_processed: u64,
    pub granted: u64,
    pub denied_unknown: u64,
    pub denied_full: u64,
    pub unavailable: u64,
}

pub struct Pipeline {
    detector: Arc<Mutex<dyn DetectorBackend>>,
    recognizer: Arc<Mutex<dyn Recognizer>>,
    validator: PlateValidator,
    voter: ConsensusVoter,
    gate: OccupancyGate,
    sampler: FrameSampler,
    confidence_threshold: f32,
    sink: Box<dyn DisplaySink>,
    status: StatusUpdate,
}

impl Pipeline {
    pub fn new(
        detector: Arc<Mutex<dyn DetectorBackend>>,
        recognizer: Arc<Mutex<dyn Recognizer>>,
        validator: PlateValidator,
        voter: ConsensusVoter,
        gate: OccupancyGate,
        settings: PipelineSettings,
        sink: Box<dyn DisplaySink>,
    ) -> Result<Self> {
        Ok(Self {
            detector,
            recognizer,
            validator,
            voter,
            gate,
            sampler: FrameSampler::new(settings.sample_every_n_frames)?,
            confidence_threshold: settings.detector_confidence_threshold,
            sink,
            status: StatusUpdate::searching(),
        })
    }

    /// Process one frame at the given instant. Returns a gate decision when
    /// the voter reached consensus on this frame.
    ///
    /// `now` is threaded through explicitly so tests drive simulated time.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> Result<Option<GateDecision>> {
        if !self.sampler.should_process(frame.seq) {
            // Display-only frame; the last status line carries over.
            self.sink.render(frame.seq, &self.status);
            return Ok(None);
        }

        if self.gate.is_cooling(now) {
            let remaining = self
                .gate
                .cooldown_remaining(now)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            self.status.message = format!("ACCESS GRANTED ({remaining}s)");
            self.status.color = StatusColor::Granted;
            self.sink.render(frame.seq, &self.status);
            return Ok(None);
        }

        let detections = match self.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                // Genuine inference failure: skip this frame, no vote.
                log::warn!("detector failed on frame {}: {:#}", frame.seq, e);
                self.sink.render(frame.seq, &self.status);
                return Ok(None);
            }
        };

        if detections.is_empty() {
            self.voter.on_empty_frame();
            self.status = StatusUpdate::searching();
            self.sink.render(frame.seq, &self.status);
            return Ok(None);
        }

        for detection in &detections {
            let crop = frame.crop(&detection.bbox);
            let candidates = {
                let mut recognizer = self
                    .recognizer
                    .lock()
                    .map_err(|_| anyhow!("recognizer lock poisoned"))?;
                match recognizer.recognize(&crop) {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        // Bad crop or engine hiccup: skip this box only.
                        log::warn!("recognizer failed on frame {}: {:#}", frame.seq, e);
                        continue;
                    }
                }
            };

            if let Some(plate) = self.validator.select(&candidates) {
                log::debug!("frame {}: reading {}", frame.seq, plate);
                self.voter.observe(plate);
            }
        }

        let Some(plate) = self.voter.decide() else {
            self.status = StatusUpdate::searching();
            self.sink.render(frame.seq, &self.status);
            return Ok(None);
        };

        let decision = self.gate.on_consensus(plate, now);
        if decision.resets_voter() {
            self.voter.reset();
        }
        self.status = status_for(&decision);
        self.sink.render(frame.seq, &self.status);
        Ok(Some(decision))
    }

    /// Drive the pipeline until the source ends or the stop flag is raised.
    pub fn run(&mut self, source: &mut dyn FrameSource, stop: &AtomicBool) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            summary.frames_seen += 1;
            if self.sampler.should_process(frame.seq) {
                summary.frames_processed += 1;
            }

            if let Some(decision) = self.process_frame(&frame, Instant::now())? {
                match decision {
                    GateDecision::Granted { .. } => summary.granted += 1,
                    GateDecision::DeniedUnknown { .. } => summary.denied_unknown += 1,
                    GateDecision::DeniedFull { .. } => summary.denied_full += 1,
                    GateDecision::Unavailable { .. } => summary.unavailable += 1,
                }
            }
        }

        Ok(summary)
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let raw = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| anyhow!("detector lock poisoned"))?;
            detector.detect(frame)?
        };

        // Convert loose model output to clamped boxes at the boundary.
        let mut detections = Vec::with_capacity(raw.len());
        for detection in raw {
            if detection.confidence < self.confidence_threshold {
                continue;
            }
            if let Some(bbox) = DetectionBox::clamped(
                detection.x1,
                detection.y1,
                detection.x2,
                detection.y2,
                frame.width,
                frame.height,
            ) {
                detections.push(Detection {
                    bbox,
                    confidence: detection.confidence,
                });
            }
        }
        Ok(detections)
    }
}

fn status_for(decision: &GateDecision) -> StatusUpdate {
    match decision {
        GateDecision::Granted { plate, occupancy } => StatusUpdate {
            message: format!("WELCOME: {plate}"),
            color: StatusColor::Granted,
            occupancy_text: Some(format!("OCCUPANCY: {occupancy}")),
        },
        GateDecision::DeniedUnknown { plate } => StatusUpdate {
            message: format!("UNREGISTERED: {plate}"),
            color: StatusColor::Denied,
            occupancy_text: None,
        },
        GateDecision::DeniedFull { occupancy } => StatusUpdate {
            message: "LOT FULL".to_string(),
            color: StatusColor::Denied,
            occupancy_text: Some(format!("OCCUPANCY: {occupancy}")),
        },
        GateDecision::Unavailable { .. } => StatusUpdate {
            message: "STORE UNAVAILABLE, RETRYING".to_string(),
            color: StatusColor::Denied,
            occupancy_text: None,
        },
    }
}

// ----------------------------------------------------------------------------
// Batch scanner
// ----------------------------------------------------------------------------

/// Whole-video analysis: no gate, no cooldown, votes accumulate across the
/// pass and each plate is reported once.
pub struct BatchScanner {
    detector: Arc<Mutex<dyn DetectorBackend>>,
    recognizer: Arc<Mutex<dyn Recognizer>>,
    validator: PlateValidator,
    voter: ConsensusVoter,
    sampler: FrameSampler,
    confidence_threshold: f32,
    seen: std::collections::BTreeSet<ValidatedPlate>,
}

impl BatchScanner {
    pub fn new(
        detector: Arc<Mutex<dyn DetectorBackend>>,
        recognizer: Arc<Mutex<dyn Recognizer>>,
        validator: PlateValidator,
        voter: ConsensusVoter,
        settings: PipelineSettings,
    ) -> Result<Self> {
        Ok(Self {
            detector,
            recognizer,
            validator,
            voter,
            sampler: FrameSampler::new(settings.sample_every_n_frames)?,
            confidence_threshold: settings.detector_confidence_threshold,
            seen: std::collections::BTreeSet::new(),
        })
    }

    /// Consume the whole source; return consensus plates in the order they
    /// first stabilized.
    pub fn scan(&mut self, source: &mut dyn FrameSource) -> Result<Vec<ValidatedPlate>> {
        let mut report = Vec::new();
        while let Some(frame) = source.next_frame()? {
            if let Some(plate) = self.scan_frame(&frame)? {
                report.push(plate);
            }
        }
        Ok(report)
    }

    /// One frame of the batch pass. Returns a plate the first time it
    /// reaches consensus within this run.
    pub fn scan_frame(&mut self, frame: &Frame) -> Result<Option<ValidatedPlate>> {
        if !self.sampler.should_process(frame.seq) {
            return Ok(None);
        }

        let raw = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| anyhow!("detector lock poisoned"))?;
            match detector.detect(frame) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("detector failed on frame {}: {:#}", frame.seq, e);
                    return Ok(None);
                }
            }
        };

        let mut saw_detection = false;
        for detection in raw {
            if detection.confidence < self.confidence_threshold {
                continue;
            }
            let Some(bbox) = DetectionBox::clamped(
                detection.x1,
                detection.y1,
                detection.x2,
                detection.y2,
                frame.width,
                frame.height,
            ) else {
                continue;
            };
            saw_detection = true;

            let crop = frame.crop(&bbox);
            let candidates = {
                let mut recognizer = self
                    .recognizer
                    .lock()
                    .map_err(|_| anyhow!("recognizer lock poisoned"))?;
                match recognizer.recognize(&crop) {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        log::warn!("recognizer failed on frame {}: {:#}", frame.seq, e);
                        continue;
                    }
                }
            };

            if let Some(plate) = self.validator.select(&candidates) {
                self.voter.observe(plate);
            }
        }

        if !saw_detection {
            self.voter.on_empty_frame();
            return Ok(None);
        }

        if let Some(plate) = self.voter.decide() {
            if self.seen.insert(plate.clone()) {
                log::info!("plate stabilized: {}", plate);
                return Ok(Some(plate));
            }
        }
        Ok(None)
    }
}
