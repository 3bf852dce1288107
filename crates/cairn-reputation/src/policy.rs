// crates/cairn-reputation/src/policy.rs
//
// Cred score arithmetic.
//
// Rewards and penalties are deliberately asymmetric:
//   Positive feedback   +1
//   Negative feedback   -3
//   Validation passed   +2
//   Validation failed  -10
//
// All arithmetic saturates into [0, 100].

use cairn_core::tier::Tier;

/// Highest possible cred score.
pub const MAX_CRED: u8 = 100;

/// Cred gained per positive (4-5) feedback.
pub const POSITIVE_FEEDBACK_REWARD: u8 = 1;

/// Cred lost per negative (1-2) feedback.
pub const NEGATIVE_FEEDBACK_PENALTY: u8 = 3;

/// Cred gained when a validation request passes.
pub const VALIDATION_PASS_REWARD: u8 = 2;

/// Cred lost when a validation request fails.
pub const VALIDATION_FAIL_PENALTY: u8 = 10;

/// Minimum average validator score (inclusive) for a pass.
pub const PASS_THRESHOLD: u8 = 60;

/// Tier for a cred value.
pub fn tier(cred: u8) -> Tier {
    Tier::from_cred(cred)
}

/// `min(cred + delta, 100)`.
pub fn clamp_add(cred: u8, delta: u8) -> u8 {
    cred.saturating_add(delta).min(MAX_CRED)
}

/// `max(cred - delta, 0)`.
pub fn clamp_sub(cred: u8, delta: u8) -> u8 {
    cred.saturating_sub(delta)
}
