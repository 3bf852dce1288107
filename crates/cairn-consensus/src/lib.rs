// crates/cairn-consensus/src/lib.rs
//
// cairn-consensus: Validation requests, validator responses, quorum, and
// resolution for Cairn.
//
// An owner opens a request, independent validators append scores, and the
// owner resolves it once the quorum floor is met. The floored average score
// decides pass or fail, and the outcome moves cred through cairn-reputation.

pub mod quorum;
pub mod validation;

pub use quorum::{average_score, Verdict, MIN_VALIDATORS};
pub use validation::{request_validation, resolve_validation, submit_validation, ValidationParams};
