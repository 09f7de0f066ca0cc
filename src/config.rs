use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ingest::VideoConfig;
use crate::pipeline::PipelineSettings;
use crate::validate::PlateValidator;
use crate::vote::{ConsensusVoter, EmptyFramePolicy};

const DEFAULT_DB_PATH: &str = "gate.db";
const DEFAULT_RESOURCE_ID: &str = "main_lot";
const DEFAULT_VIDEO_URL: &str = "stub://lane_camera";
const DEFAULT_VIDEO_FPS: u32 = 30;
const DEFAULT_VIDEO_WIDTH: u32 = 640;
const DEFAULT_VIDEO_HEIGHT: u32 = 480;
const DEFAULT_SAMPLE_EVERY: u32 = 3;
const DEFAULT_WINDOW_SIZE: usize = 5;
const DEFAULT_MIN_VOTES: usize = 3;
const DEFAULT_COOLDOWN_SECS: u64 = 15;
const DEFAULT_DETECTOR_CONFIDENCE: f32 = 0.5;
const DEFAULT_MIN_LENGTH: usize = 5;
const DEFAULT_FALLBACK_MIN_LENGTH: usize = 7;
const DEFAULT_FALLBACK_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    db_path: Option<String>,
    resource_id: Option<String>,
    video: Option<VideoConfigFile>,
    sampling: Option<SamplingConfigFile>,
    voting: Option<VotingConfigFile>,
    validation: Option<ValidationConfigFile>,
    cooldown_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    every_n_frames: Option<u32>,
    detector_confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct VotingConfigFile {
    window_size: Option<usize>,
    min_votes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ValidationConfigFile {
    min_length: Option<usize>,
    fallback_min_length: Option<usize>,
    fallback_min_confidence: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub db_path: String,
    pub resource_id: String,
    pub video: VideoConfig,
    pub sample_every_n_frames: u32,
    pub detector_confidence_threshold: f32,
    pub window_size: usize,
    pub min_votes: usize,
    pub recognizer_min_length: usize,
    pub fallback_min_length: usize,
    pub fallback_min_confidence: f32,
    pub cooldown: Duration,
}

impl GateConfig {
    /// Load configuration: defaults, then the JSON file named by
    /// `GATE_CONFIG` (if set), then per-field env overrides, then
    /// validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GateConfigFile) -> Self {
        let video = VideoConfig {
            url: file
                .video
                .as_ref()
                .and_then(|video| video.url.clone())
                .unwrap_or_else(|| DEFAULT_VIDEO_URL.to_string()),
            target_fps: file
                .video
                .as_ref()
                .and_then(|video| video.target_fps)
                .unwrap_or(DEFAULT_VIDEO_FPS),
            width: file
                .video
                .as_ref()
                .and_then(|video| video.width)
                .unwrap_or(DEFAULT_VIDEO_WIDTH),
            height: file
                .video
                .as_ref()
                .and_then(|video| video.height)
                .unwrap_or(DEFAULT_VIDEO_HEIGHT),
        };
        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            resource_id: file
                .resource_id
                .unwrap_or_else(|| DEFAULT_RESOURCE_ID.to_string()),
            video,
            sample_every_n_frames: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.every_n_frames)
                .unwrap_or(DEFAULT_SAMPLE_EVERY),
            detector_confidence_threshold: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.detector_confidence_threshold)
                .unwrap_or(DEFAULT_DETECTOR_CONFIDENCE),
            window_size: file
                .voting
                .as_ref()
                .and_then(|voting| voting.window_size)
                .unwrap_or(DEFAULT_WINDOW_SIZE),
            min_votes: file
                .voting
                .as_ref()
                .and_then(|voting| voting.min_votes)
                .unwrap_or(DEFAULT_MIN_VOTES),
            recognizer_min_length: file
                .validation
                .as_ref()
                .and_then(|validation| validation.min_length)
                .unwrap_or(DEFAULT_MIN_LENGTH),
            fallback_min_length: file
                .validation
                .as_ref()
                .and_then(|validation| validation.fallback_min_length)
                .unwrap_or(DEFAULT_FALLBACK_MIN_LENGTH),
            fallback_min_confidence: file
                .validation
                .as_ref()
                .and_then(|validation| validation.fallback_min_confidence)
                .unwrap_or(DEFAULT_FALLBACK_MIN_CONFIDENCE),
            cooldown: Duration::from_secs(
                file.cooldown_seconds.unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("GATE_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(url) = std::env::var("GATE_VIDEO_URL") {
            if !url.trim().is_empty() {
                self.video.url = url;
            }
        }
        if let Ok(resource) = std::env::var("GATE_RESOURCE_ID") {
            if !resource.trim().is_empty() {
                self.resource_id = resource;
            }
        }
        if let Ok(every) = std::env::var("GATE_SAMPLE_EVERY") {
            self.sample_every_n_frames = every
                .parse()
                .map_err(|_| anyhow!("GATE_SAMPLE_EVERY must be an integer frame interval"))?;
        }
        if let Ok(cooldown) = std::env::var("GATE_COOLDOWN_SECS") {
            let seconds: u64 = cooldown
                .parse()
                .map_err(|_| anyhow!("GATE_COOLDOWN_SECS must be an integer number of seconds"))?;
            self.cooldown = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sample_every_n_frames == 0 {
            return Err(anyhow!("sampling.every_n_frames must be >= 1"));
        }
        if self.min_votes == 0 || self.min_votes > self.window_size {
            return Err(anyhow!(
                "voting.min_votes must be in 1..=window_size ({} given, window {})",
                self.min_votes,
                self.window_size
            ));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence_threshold) {
            return Err(anyhow!(
                "sampling.detector_confidence_threshold must be within [0, 1]"
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_min_confidence) {
            return Err(anyhow!(
                "validation.fallback_min_confidence must be within [0, 1]"
            ));
        }
        Ok(())
    }

    pub fn validator(&self) -> PlateValidator {
        PlateValidator {
            min_length: self.recognizer_min_length,
            fallback_min_length: self.fallback_min_length,
            fallback_min_confidence: self.fallback_min_confidence,
        }
    }

    /// Voter for the live gate: configured window, reset on empty frames.
    pub fn streaming_voter(&self) -> ConsensusVoter {
        ConsensusVoter::new(self.window_size, self.min_votes, EmptyFramePolicy::Reset)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            sample_every_n_frames: self.sample_every_n_frames,
            detector_confidence_threshold: self.detector_confidence_threshold,
        }
    }
}

fn read_config_file(path: &Path) -> Result<GateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
