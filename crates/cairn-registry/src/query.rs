// crates/cairn-registry/src/query.rs
//
// Read-only snapshots handed to gateways and session managers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cairn_core::{
    AgentId, AgentRecord, Principal, RequestId, Tier, ValidationRequest, ValidationStatus,
};

/// Point-in-time view of an agent's identity and reputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: AgentId,
    pub owner: Principal,
    pub wallet: Principal,
    pub name: String,
    pub cred_score: u8,
    pub tier: Tier,
    pub is_active: bool,
    pub delegate_count: usize,
    pub total_feedback_received: u64,
    pub positive_feedback: u64,
    pub negative_feedback: u64,
    pub total_sessions: u64,
    pub registered_at: DateTime<Utc>,
    pub last_session_at: Option<DateTime<Utc>>,
}

impl From<&AgentRecord> for AgentView {
    fn from(record: &AgentRecord) -> Self {
        Self {
            id: record.id,
            owner: record.owner,
            wallet: record.wallet,
            name: record.profile.name.clone(),
            cred_score: record.cred_score,
            tier: record.tier(),
            is_active: record.is_active,
            delegate_count: record.delegates.len(),
            total_feedback_received: record.total_feedback_received,
            positive_feedback: record.positive_feedback,
            negative_feedback: record.negative_feedback,
            total_sessions: record.total_sessions,
            registered_at: record.registered_at,
            last_session_at: record.last_session_at,
        }
    }
}

/// (status, avg_score, validator_count) for one validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatusView {
    pub request_id: RequestId,
    pub agent_id: AgentId,
    pub status: ValidationStatus,
    pub avg_score: Option<u8>,
    pub validator_count: usize,
}

impl From<&ValidationRequest> for ValidationStatusView {
    fn from(request: &ValidationRequest) -> Self {
        Self {
            request_id: request.request_id,
            agent_id: request.agent_id,
            status: request.status,
            avg_score: request.avg_score,
            validator_count: request.validator_count(),
        }
    }
}
