// crates/cairn-reputation/src/ledger.rs
//
// Feedback ledger: deduplicated application of third-party feedback.
//
// Checks (self-review, value range, session dedup) all run before the first
// write, so a rejected submission leaves the record and directory untouched.
// Feedback is accepted for inactive records too; it is one of the ways a
// suspended agent climbs back out.

use chrono::{DateTime, Utc};

use cairn_core::crypto::ContentHash;
use cairn_core::directory::Directory;
use cairn_core::events::{CredReason, RegistryEvent};
use cairn_core::feedback::{FeedbackRecord, FeedbackSentiment};
use cairn_core::{AgentRecord, CairnError, Principal, SessionId};

use crate::tier_change::apply_cred_change;

/// Lowest accepted feedback value.
pub const MIN_FEEDBACK_VALUE: u8 = 1;

/// Highest accepted feedback value.
pub const MAX_FEEDBACK_VALUE: u8 = 5;

/// One feedback submission as received from a submitter.
#[derive(Debug, Clone)]
pub struct FeedbackInput {
    pub value: u8,
    pub tag: String,
    pub comment_hash: ContentHash,
    pub session_id: SessionId,
}

/// Apply feedback from `submitter` to `record`.
///
/// # Errors
/// - `SelfFeedback` if the submitter owns the record.
/// - `InvalidValue` if `value` is outside 1..=5.
/// - `DuplicateFeedback` if this submitter already reviewed this session.
pub fn submit_feedback(
    record: &mut AgentRecord,
    directory: &mut Directory,
    submitter: Principal,
    input: FeedbackInput,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<FeedbackRecord, CairnError> {
    if record.is_owner(&submitter) {
        return Err(CairnError::SelfFeedback);
    }
    if !(MIN_FEEDBACK_VALUE..=MAX_FEEDBACK_VALUE).contains(&input.value) {
        return Err(CairnError::InvalidValue(input.value));
    }
    if record.has_reviewed(&submitter, &input.session_id) {
        return Err(CairnError::DuplicateFeedback);
    }

    // All checks passed; from here on every step lands.
    record
        .feedback_sessions
        .entry(submitter)
        .or_default()
        .insert(input.session_id.clone());

    let sentiment = FeedbackSentiment::from_value(input.value);
    record.total_feedback_received += 1;
    record.updated_at = now;

    let feedback_id = directory.next_feedback_id();
    events.push(RegistryEvent::FeedbackSubmitted {
        feedback_id,
        agent_id: record.id,
        submitter,
        value: input.value,
        at: now,
    });

    match sentiment {
        FeedbackSentiment::Positive => {
            record.positive_feedback += 1;
            apply_cred_change(record, directory, CredReason::PositiveFeedback, now, events);
        }
        FeedbackSentiment::Negative => {
            record.negative_feedback += 1;
            apply_cred_change(record, directory, CredReason::NegativeFeedback, now, events);
        }
        FeedbackSentiment::Neutral => {}
    }

    tracing::debug!(
        "Feedback {} on agent {} from {}: value {} -> cred {}",
        feedback_id,
        record.id,
        submitter.short(),
        input.value,
        record.cred_score
    );

    Ok(FeedbackRecord {
        feedback_id,
        agent_id: record.id,
        submitter,
        value: input.value,
        sentiment,
        tag: input.tag,
        comment_hash: input.comment_hash,
        session_id: input.session_id,
        created_at: now,
    })
}
