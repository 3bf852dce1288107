// crates/cairn-consensus/src/quorum.rs
//
// Quorum floor and average-score resolution.
//
// The average is floor(sum / count) with integer truncation, and an average
// of exactly PASS_THRESHOLD passes. Both must stay bit-for-bit stable.

use serde::{Deserialize, Serialize};

use cairn_core::validation::ValidationResponse;
use cairn_core::CairnError;
use cairn_reputation::PASS_THRESHOLD;

/// Fewest distinct validators a request needs before it can resolve.
/// Keeps a single validator, or a colluding pair, from deciding alone.
pub const MIN_VALIDATORS: usize = 3;

/// Floor of the mean score, or `None` when there are no responses.
pub fn average_score(responses: &[ValidationResponse]) -> Option<u8> {
    if responses.is_empty() {
        return None;
    }
    let sum: u64 = responses.iter().map(|r| u64::from(r.score)).sum();
    let count = responses.len() as u64;
    // Scores are <= 100, so the mean always fits in a u8.
    Some(u8::try_from(sum / count).unwrap_or(u8::MAX))
}

/// Outcome of a resolved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub avg_score: u8,
    pub passed: bool,
}

impl Verdict {
    /// Judge a set of responses against a quorum floor.
    ///
    /// # Errors
    /// Returns `CairnError::InsufficientValidators` below the floor.
    pub fn from_responses(
        responses: &[ValidationResponse],
        quorum: usize,
    ) -> Result<Self, CairnError> {
        if responses.len() < quorum {
            return Err(CairnError::InsufficientValidators {
                have: responses.len(),
                need: quorum,
            });
        }
        match average_score(responses) {
            Some(avg_score) => Ok(Self {
                avg_score,
                passed: avg_score >= PASS_THRESHOLD,
            }),
            // Only reachable with a zero quorum.
            None => Err(CairnError::InsufficientValidators {
                have: 0,
                need: quorum.max(1),
            }),
        }
    }
}
