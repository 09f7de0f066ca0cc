//! Local video source.
//!
//! `FileSource` accepts `stub://` URLs and produces synthetic frames: a
//! slowly mutating gradient scene, capped at a configurable frame count so
//! batch runs terminate. Anything that is not a `stub://` URL needs a real
//! decoder, which is integrated by the deployment; constructing a source for
//! such a URL fails up front rather than mid-stream.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Video source settings, shared by the config surface and the bins.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    /// Source URL. Only `stub://` is handled in-crate.
    pub url: String,
    /// Nominal capture rate; the sampler decimates further.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            url: "stub://lane_camera".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

pub struct FileSource {
    config: VideoConfig,
    connected: bool,
    frame_count: u64,
    frame_limit: Option<u64>,
    scene_state: u8,
}

impl FileSource {
    pub fn new(config: VideoConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "no decoder for '{}': only stub:// sources are built in",
                config.url
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("video dimensions must be nonzero"));
        }
        Ok(Self {
            config,
            connected: false,
            frame_count: 0,
            frame_limit: None,
            scene_state: 0,
        })
    }

    /// Cap the stream at `limit` frames, after which `next_frame` reports
    /// end of stream.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        // Shift the scene every 50 frames so consecutive frames differ.
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("FileSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("source not connected"));
        }
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }

        self.frame_count += 1;
        let pixels = self.generate_pixels();
        let frame = Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }
}
