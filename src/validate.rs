//! Plate text validation.
//!
//! Raw recognizer output is noisy: partial reads, merged whitespace, low
//! confidence garbage. This module turns one recognition call's candidate
//! list into at most one `ValidatedPlate`:
//!
//! - Normalization: uppercase, all whitespace stripped.
//! - Grammar path: the national plate format (two-digit province code 01-81,
//!   1-3 letters, 2-4 digits). Highest-confidence grammar match wins.
//! - Fallback path: no grammar match, but the text is long enough and the
//!   recognizer was confident enough. The first such candidate scanned wins;
//!   later fallbacks do not displace it even at higher confidence.
//!
//! A grammar match always beats any fallback.

use std::sync::OnceLock;

use crate::recognize::PlateCandidate;

/// A normalized plate reading that passed validation. Only constructible
/// through [`PlateValidator::select`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatedPlate(String);

impl ValidatedPlate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl std::fmt::Display for ValidatedPlate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn plate_grammar() -> &'static regex::Regex {
    // Compile once for hot paths.
    static PLATE_RE: OnceLock<regex::Regex> = OnceLock::new();
    PLATE_RE.get_or_init(|| {
        regex::Regex::new(r"^(0[1-9]|[1-7][0-9]|8[01])[A-Z]{1,3}[0-9]{2,4}$").unwrap()
    })
}

/// Uppercase and strip all whitespace, internal and surrounding.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Validation thresholds. Defaults match the live deployment.
#[derive(Clone, Copy, Debug)]
pub struct PlateValidator {
    /// Candidates shorter than this are dropped before either path.
    pub min_length: usize,
    /// Fallback path: minimum normalized length.
    pub fallback_min_length: usize,
    /// Fallback path: confidence must be strictly greater.
    pub fallback_min_confidence: f32,
}

impl Default for PlateValidator {
    fn default() -> Self {
        Self {
            min_length: 5,
            fallback_min_length: 7,
            fallback_min_confidence: 0.5,
        }
    }
}

impl PlateValidator {
    /// Select at most one plate from the candidates of a single recognition
    /// call.
    pub fn select(&self, candidates: &[PlateCandidate]) -> Option<ValidatedPlate> {
        let mut best_grammar: Option<(String, f32)> = None;
        let mut fallback: Option<String> = None;

        for candidate in candidates {
            let text = normalize(&candidate.text);
            if text.len() < self.min_length {
                continue;
            }

            if plate_grammar().is_match(&text) {
                let better = match &best_grammar {
                    Some((_, conf)) => candidate.confidence > *conf,
                    None => true,
                };
                if better {
                    best_grammar = Some((text, candidate.confidence));
                }
            } else if fallback.is_none()
                && text.len() >= self.fallback_min_length
                && candidate.confidence > self.fallback_min_confidence
            {
                // First sufficiently long, sufficiently confident candidate
                // sticks. Intentionally no confidence comparison after that.
                fallback = Some(text);
            }
        }

        if let Some((text, _)) = best_grammar {
            return Some(ValidatedPlate(text));
        }
        fallback.map(ValidatedPlate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(text: &str, confidence: f32) -> PlateCandidate {
        PlateCandidate {
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn grammar_plate_validates() {
        let v = PlateValidator::default();
        let plate = v.select(&[cand("34 ABC 123", 0.4)]).unwrap();
        assert_eq!(plate.as_str(), "34ABC123");
    }

    #[test]
    fn invalid_province_needs_fallback() {
        let v = PlateValidator::default();
        // Province 00 fails the grammar; length 8 and confidence above 0.5
        // still admit it through the fallback path.
        let plate = v.select(&[cand("00ABC123", 0.8)]).unwrap();
        assert_eq!(plate.as_str(), "00ABC123");
        // Same text below the confidence floor is rejected outright.
        assert!(v.select(&[cand("00ABC123", 0.5)]).is_none());
    }

    #[test]
    fn short_text_always_rejected() {
        let v = PlateValidator::default();
        assert!(v.select(&[cand("AB", 0.99)]).is_none());
    }

    #[test]
    fn highest_confidence_grammar_match_wins() {
        let v = PlateValidator::default();
        let plate = v
            .select(&[cand("34ABC123", 0.6), cand("06DEF456", 0.9)])
            .unwrap();
        assert_eq!(plate.as_str(), "06DEF456");
    }

    #[test]
    fn grammar_match_beats_fallback() {
        let v = PlateValidator::default();
        let plate = v
            .select(&[cand("XX-LONG-99", 0.99), cand("34ABC123", 0.3)])
            .unwrap();
        assert_eq!(plate.as_str(), "34ABC123");
    }

    #[test]
    fn first_fallback_sticks() {
        let v = PlateValidator::default();
        let plate = v
            .select(&[cand("AAAAAAA1", 0.6), cand("BBBBBBB2", 0.95)])
            .unwrap();
        assert_eq!(plate.as_str(), "AAAAAAA1");
    }

    #[test]
    fn province_boundaries() {
        let v = PlateValidator::default();
        assert_eq!(v.select(&[cand("01A12", 0.2)]).unwrap().as_str(), "01A12");
        assert_eq!(
            v.select(&[cand("81ABC1234", 0.2)]).unwrap().as_str(),
            "81ABC1234"
        );
        // 82 is out of range and the text is too short for the fallback.
        assert!(v.select(&[cand("82A12", 0.9)]).is_none());
    }
}
