//! Temporal consensus over noisy plate readings.
//!
//! One OCR pass is unreliable; a plate is acted on only after it wins a vote
//! over a bounded window of recent validated readings. Two presets exist,
//! matching the two deployed configurations:
//!
//! - `streaming()`: window 5, min support 3. Low latency, used by the live
//!   gate, paired with `EmptyFramePolicy::Reset` (a sampled frame with zero
//!   detections means "no vehicle present" and discards in-flight consensus).
//! - `batch()`: window 40, min support 5. Used by whole-video analysis,
//!   paired with `EmptyFramePolicy::Accumulate` (empty frames are ignored and
//!   votes accumulate across the entire pass).
//!
//! The policy is chosen at construction and never mixed within one run.

use std::collections::{HashMap, VecDeque};

use crate::validate::ValidatedPlate;

/// What a sampled frame with zero detections does to in-flight consensus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptyFramePolicy {
    /// Discard the window. Streaming semantics: nothing in front of the
    /// camera invalidates partial agreement.
    Reset,
    /// Keep the window. Batch semantics: votes accumulate across the pass.
    Accumulate,
}

/// Bounded-window majority voter.
#[derive(Clone, Debug)]
pub struct ConsensusVoter {
    window: VecDeque<ValidatedPlate>,
    capacity: usize,
    min_votes: usize,
    empty_frame_policy: EmptyFramePolicy,
}

impl ConsensusVoter {
    pub fn new(capacity: usize, min_votes: usize, empty_frame_policy: EmptyFramePolicy) -> Self {
        debug_assert!(min_votes <= capacity);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            min_votes,
            empty_frame_policy,
        }
    }

    /// Live-gate preset: window 5, min support 3, reset on empty frames.
    pub fn streaming() -> Self {
        Self::new(5, 3, EmptyFramePolicy::Reset)
    }

    /// Whole-video preset: window 40, min support 5, accumulate across
    /// empty frames.
    pub fn batch() -> Self {
        Self::new(40, 5, EmptyFramePolicy::Accumulate)
    }

    /// Record one validated reading. Evicts the oldest reading when full.
    pub fn observe(&mut self, plate: ValidatedPlate) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(plate);
    }

    /// The winning plate, if any reading has reached minimum support.
    ///
    /// Ties break toward the plate first inserted into the window, so a
    /// late-arriving rival at equal count never displaces the incumbent.
    pub fn decide(&self) -> Option<ValidatedPlate> {
        if self.window.len() < self.min_votes {
            return None;
        }

        let mut counts: HashMap<&ValidatedPlate, usize> = HashMap::new();
        for plate in &self.window {
            *counts.entry(plate).or_insert(0) += 1;
        }

        let mut best: Option<(&ValidatedPlate, usize)> = None;
        let mut seen_order: Vec<&ValidatedPlate> = Vec::new();
        for plate in &self.window {
            if seen_order.contains(&plate) {
                continue;
            }
            seen_order.push(plate);
            let votes = counts[plate];
            if best.map_or(true, |(_, b)| votes > b) {
                best = Some((plate, votes));
            }
        }

        match best {
            Some((plate, votes)) if votes >= self.min_votes => Some(plate.clone()),
            _ => None,
        }
    }

    /// Clear the window. Called after a decision is acted on, and on empty
    /// sampled frames under `EmptyFramePolicy::Reset`.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Apply the configured policy for a sampled frame with no detections.
    pub fn on_empty_frame(&mut self) {
        if self.empty_frame_policy == EmptyFramePolicy::Reset {
            self.window.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate(text: &str) -> ValidatedPlate {
        ValidatedPlate::for_tests(text)
    }

    #[test]
    fn no_decision_below_min_support() {
        let mut voter = ConsensusVoter::batch();
        for _ in 0..4 {
            voter.observe(plate("34ABC123"));
        }
        voter.observe(plate("06XYZ42"));
        assert_eq!(voter.decide(), None);
    }

    #[test]
    fn fifth_vote_reaches_consensus() {
        let mut voter = ConsensusVoter::batch();
        for _ in 0..4 {
            voter.observe(plate("34ABC123"));
        }
        voter.observe(plate("06XYZ42"));
        voter.observe(plate("34ABC123"));
        assert_eq!(voter.decide(), Some(plate("34ABC123")));
    }

    #[test]
    fn window_evicts_oldest() {
        let mut voter = ConsensusVoter::new(3, 2, EmptyFramePolicy::Accumulate);
        voter.observe(plate("34AAA11"));
        voter.observe(plate("34AAA11"));
        voter.observe(plate("06BBB22"));
        assert_eq!(voter.decide(), Some(plate("34AAA11")));

        // Two more readings push the first 34AAA11 out.
        voter.observe(plate("06BBB22"));
        voter.observe(plate("06BBB22"));
        assert_eq!(voter.len(), 3);
        assert_eq!(voter.decide(), Some(plate("06BBB22")));
    }

    #[test]
    fn tie_breaks_to_first_inserted() {
        let mut voter = ConsensusVoter::new(10, 2, EmptyFramePolicy::Accumulate);
        voter.observe(plate("34AAA11"));
        voter.observe(plate("06BBB22"));
        voter.observe(plate("06BBB22"));
        voter.observe(plate("34AAA11"));
        assert_eq!(voter.decide(), Some(plate("34AAA11")));
    }

    #[test]
    fn streaming_resets_on_empty_frame() {
        let mut voter = ConsensusVoter::streaming();
        voter.observe(plate("34ABC123"));
        voter.observe(plate("34ABC123"));
        voter.on_empty_frame();
        assert!(voter.is_empty());
    }

    #[test]
    fn batch_accumulates_across_empty_frames() {
        let mut voter = ConsensusVoter::batch();
        for _ in 0..3 {
            voter.observe(plate("34ABC123"));
            voter.on_empty_frame();
        }
        assert_eq!(voter.len(), 3);
    }

    #[test]
    fn reset_clears_window() {
        let mut voter = ConsensusVoter::streaming();
        for _ in 0..3 {
            voter.observe(plate("34ABC123"));
        }
        assert!(voter.decide().is_some());
        voter.reset();
        assert_eq!(voter.decide(), None);
    }
}
