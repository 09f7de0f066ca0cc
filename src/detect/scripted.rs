use anyhow::Result;

use crate::detect::backend::{DetectorBackend, RawDetection};
use crate::frame::Frame;

/// Scripted backend for tests and the demo. Replays a fixed queue of
/// detection lists, then keeps returning empty frames. Counts calls so tests
/// can assert that cooldown suppresses inference.
#[derive(Default)]
pub struct ScriptedDetector {
    script: std::collections::VecDeque<Vec<RawDetection>>,
    pub calls: u64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame with a single centered plate box.
    pub fn push_plate_box(&mut self, confidence: f32) {
        self.script.push_back(vec![RawDetection {
            x1: 100,
            y1: 200,
            x2: 300,
            y2: 260,
            confidence,
        }]);
    }

    /// Queue a frame with no detections.
    pub fn push_empty(&mut self) {
        self.script.push_back(Vec::new());
    }

    /// Queue a frame with explicit raw boxes.
    pub fn push_boxes(&mut self, boxes: Vec<RawDetection>) {
        self.script.push_back(boxes);
    }
}

impl DetectorBackend for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
