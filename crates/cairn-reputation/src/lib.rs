// crates/cairn-reputation/src/lib.rs
//
// cairn-reputation: Cred score policy, tier-change handling, and the
// feedback ledger for Cairn.
//
// Cred moves only through this crate. Every mutation runs the same
// tier-change step, which is also the only automatic deactivation path.

pub mod ledger;
pub mod policy;
pub mod tier_change;

pub use ledger::{submit_feedback, FeedbackInput};
pub use policy::{
    clamp_add, clamp_sub, tier, NEGATIVE_FEEDBACK_PENALTY, PASS_THRESHOLD,
    POSITIVE_FEEDBACK_REWARD, VALIDATION_FAIL_PENALTY, VALIDATION_PASS_REWARD,
};
pub use tier_change::{apply_cred_change, CredChange, CredOutcome};
