// crates/cairn-core/src/validation.rs
//
// Third-party validation requests.
//
// Lifecycle: Pending --(resolve, quorum met)--> Passed | Failed
// Responses are append-only while Pending; the request is immutable afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::ContentHash;
use crate::identity::{AgentId, Principal, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Pending,
    Passed,
    Failed,
}

/// One validator's attestation, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub validator: Principal,
    /// Score in 0..=100.
    pub score: u8,
    pub tag: String,
    pub submitted_at: DateTime<Utc>,
}

/// A request for independent validators to attest to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub request_id: RequestId,
    pub agent_id: AgentId,
    /// Owner at request time. Barred from responding.
    pub agent_owner: Principal,
    pub request_uri: String,
    pub request_hash: ContentHash,
    /// Append-only, arrival-ordered. No validator appears twice.
    pub responses: Vec<ValidationResponse>,
    pub status: ValidationStatus,
    /// Floor of the mean score; set on resolution.
    pub avg_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ValidationRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ValidationStatus::Pending
    }

    pub fn validator_count(&self) -> usize {
        self.responses.len()
    }

    pub fn has_validator(&self, validator: &Principal) -> bool {
        self.responses.iter().any(|r| r.validator == *validator)
    }

    pub fn validators(&self) -> impl Iterator<Item = &Principal> {
        self.responses.iter().map(|r| &r.validator)
    }
}
