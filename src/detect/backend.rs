use anyhow::Result;

use crate::frame::Frame;

/// Unclamped model output: coordinates may fall outside the frame or be
/// inverted. Converted to a clamped `DetectionBox` at ingress; boxes that
/// clamp to nothing are dropped there.
#[derive(Clone, Copy, Debug)]
pub struct RawDetection {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    pub confidence: f32,
}

/// Detector backend trait.
///
/// An empty result means "no plate in frame" and is a normal outcome, never
/// an error. `Err` is reserved for genuine inference failures; the caller
/// recovers by skipping the frame's remaining work for this backend call.
///
/// Implementations must treat the pixel data as read-only and ephemeral.
pub trait DetectorBackend: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook (model load, first-inference cost).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
