// crates/cairn-core/src/events.rs
//
// Domain events emitted after each state change.
//
// Operations append events to a buffer in the order their mutations happen;
// the buffer is published only when the whole operation succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AgentId, FeedbackId, Principal, RequestId};
use crate::tier::Tier;

/// Why a cred score moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredReason {
    PositiveFeedback,
    NegativeFeedback,
    ValidationPassed,
    ValidationFailed,
}

/// Why an agent stopped being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivationCause {
    /// Explicit owner action.
    Owner,
    /// Cred fell into the Suspended tier.
    AutoSuspended,
    /// Owner unregistered the agent.
    Unregistered,
}

/// Structured record of one state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryEvent {
    RecordCreated {
        agent_id: AgentId,
        owner: Principal,
        wallet: Principal,
        at: DateTime<Utc>,
    },
    RecordFieldUpdated {
        agent_id: AgentId,
        field: String,
        at: DateTime<Utc>,
    },
    OwnershipTransferred {
        agent_id: AgentId,
        old_owner: Principal,
        new_owner: Principal,
        at: DateTime<Utc>,
    },
    DelegateAdded {
        agent_id: AgentId,
        delegate: Principal,
    },
    DelegateRemoved {
        agent_id: AgentId,
        delegate: Principal,
    },
    RecordDeactivated {
        agent_id: AgentId,
        cause: DeactivationCause,
        at: DateTime<Utc>,
    },
    RecordReactivated {
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
    RecordRemoved {
        agent_id: AgentId,
        owner: Principal,
        at: DateTime<Utc>,
    },
    SessionRecorded {
        agent_id: AgentId,
        total_sessions: u64,
        at: DateTime<Utc>,
    },
    FeedbackSubmitted {
        feedback_id: FeedbackId,
        agent_id: AgentId,
        submitter: Principal,
        value: u8,
        at: DateTime<Utc>,
    },
    CredUpdated {
        agent_id: AgentId,
        old_cred: u8,
        new_cred: u8,
        reason: CredReason,
    },
    TierChanged {
        agent_id: AgentId,
        old_tier: Tier,
        new_tier: Tier,
    },
    ValidationRequested {
        request_id: RequestId,
        agent_id: AgentId,
        requester: Principal,
        at: DateTime<Utc>,
    },
    ValidationResponseSubmitted {
        request_id: RequestId,
        validator: Principal,
        score: u8,
        at: DateTime<Utc>,
    },
    ValidationResolved {
        request_id: RequestId,
        agent_id: AgentId,
        passed: bool,
        avg_score: u8,
        at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    /// Stable snake_case name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::RecordCreated { .. } => "record_created",
            RegistryEvent::RecordFieldUpdated { .. } => "record_field_updated",
            RegistryEvent::OwnershipTransferred { .. } => "ownership_transferred",
            RegistryEvent::DelegateAdded { .. } => "delegate_added",
            RegistryEvent::DelegateRemoved { .. } => "delegate_removed",
            RegistryEvent::RecordDeactivated { .. } => "record_deactivated",
            RegistryEvent::RecordReactivated { .. } => "record_reactivated",
            RegistryEvent::RecordRemoved { .. } => "record_removed",
            RegistryEvent::SessionRecorded { .. } => "session_recorded",
            RegistryEvent::FeedbackSubmitted { .. } => "feedback_submitted",
            RegistryEvent::CredUpdated { .. } => "cred_updated",
            RegistryEvent::TierChanged { .. } => "tier_changed",
            RegistryEvent::ValidationRequested { .. } => "validation_requested",
            RegistryEvent::ValidationResponseSubmitted { .. } => "validation_response_submitted",
            RegistryEvent::ValidationResolved { .. } => "validation_resolved",
        }
    }
}
