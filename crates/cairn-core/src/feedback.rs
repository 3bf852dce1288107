// crates/cairn-core/src/feedback.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::ContentHash;
use crate::identity::{AgentId, FeedbackId, Principal, SessionId};

/// How a feedback value moves cred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackSentiment {
    /// Values 4 and 5.
    Positive,
    /// Value 3. Counted in the total, moves nothing.
    Neutral,
    /// Values 1 and 2.
    Negative,
}

impl FeedbackSentiment {
    /// Classify an already range-checked value in 1..=5.
    pub fn from_value(value: u8) -> Self {
        if value >= 4 {
            FeedbackSentiment::Positive
        } else if value <= 2 {
            FeedbackSentiment::Negative
        } else {
            FeedbackSentiment::Neutral
        }
    }
}

/// Immutable receipt of one accepted feedback submission, owned by the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: FeedbackId,
    pub agent_id: AgentId,
    pub submitter: Principal,
    /// Rating in 1..=5.
    pub value: u8,
    pub sentiment: FeedbackSentiment,
    pub tag: String,
    /// Digest of the off-registry comment text.
    pub comment_hash: ContentHash,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}
