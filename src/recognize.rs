//! Text recognition boundary.
//!
//! The OCR engine is an external collaborator. The pipeline only sees this
//! trait: a cropped plate image in, zero or more loosely structured
//! candidates out. Candidates are converted to owned value types at the
//! boundary; nothing downstream touches engine-specific output.
//!
//! # Audit boundary
//!
//! Implementations must treat the crop as read-only and ephemeral: no disk
//! writes, no retention beyond the call.

use anyhow::Result;

use crate::frame::Frame;

/// One raw reading from the recognizer. `confidence` is in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct PlateCandidate {
    pub text: String,
    pub confidence: f32,
}

/// Recognizer backend trait.
///
/// An empty candidate list is a normal outcome (unreadable plate), not an
/// error. `Err` is reserved for genuine failures such as a malformed crop.
pub trait Recognizer: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    fn recognize(&mut self, crop: &Frame) -> Result<Vec<PlateCandidate>>;

    /// Optional warm-up hook (model load, first-inference cost).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Scripted recognizer (tests, demo)
// ----------------------------------------------------------------------------

/// Scripted recognizer: replays a fixed queue of candidate lists, then keeps
/// returning empty. Counts calls so tests can assert suppression windows.
#[derive(Default)]
pub struct ScriptedRecognizer {
    script: std::collections::VecDeque<Vec<PlateCandidate>>,
    pub calls: u64,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one recognition result of a single candidate.
    pub fn push_reading(&mut self, text: &str, confidence: f32) {
        self.script.push_back(vec![PlateCandidate {
            text: text.to_string(),
            confidence,
        }]);
    }

    /// Queue one recognition result with several candidates.
    pub fn push_candidates(&mut self, candidates: Vec<PlateCandidate>) {
        self.script.push_back(candidates);
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&mut self, _crop: &Frame) -> Result<Vec<PlateCandidate>> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
