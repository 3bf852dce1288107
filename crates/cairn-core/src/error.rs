// crates/cairn-core/src/error.rs

use thiserror::Error;

/// Coarse failure classes. Callers map these onto user-visible errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller is not the owner, or not authorized for the action.
    Authorization,
    /// Entity is in the wrong lifecycle state for the action.
    State,
    /// Out-of-range value, empty required field, length mismatch.
    ValidationInput,
    /// Duplicate or missing set membership.
    Conflict,
    /// Quorum not reached.
    Consensus,
    /// Storage, serialization, or lookup failures outside the domain rules.
    Infrastructure,
}

/// Registry-wide error type for Cairn.
///
/// Every domain rejection leaves all state exactly as it was before the call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CairnError {
    /// Caller is not the record (or request) owner.
    #[error("Caller is not the owner")]
    NotOwner,

    /// Caller is neither owner, wallet, nor delegate.
    #[error("Caller is not authorized for this agent")]
    NotAuthorized,

    /// Profile or request input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Agent sits in the Suspended tier and cannot self-reactivate.
    #[error("Agent is suspended (cred {cred}) and cannot be reactivated")]
    SuspendedState { cred: u8 },

    #[error("Agent is already active")]
    AlreadyActive,

    #[error("Agent is already inactive")]
    AlreadyInactive,

    /// Participation-facing operation attempted on an inactive agent.
    #[error("Agent is inactive")]
    AgentInactive,

    #[error("Principal is already a delegate")]
    DelegateExists,

    #[error("Principal is not a delegate")]
    DelegateNotFound,

    #[error("Delegate limit of {max} reached")]
    TooManyDelegates { max: usize },

    /// Owners may not review their own agent.
    #[error("Owner cannot submit feedback on their own agent")]
    SelfFeedback,

    #[error("Feedback value {0} outside 1..=5")]
    InvalidValue(u8),

    /// The (submitter, session) pair has already been used.
    #[error("Feedback already submitted for this session")]
    DuplicateFeedback,

    #[error("Validation request already resolved")]
    AlreadyResolved,

    #[error("Agent owner cannot validate their own agent")]
    CannotValidateSelf,

    #[error("Validator already responded to this request")]
    AlreadyValidated,

    #[error("Validation score {0} exceeds 100")]
    InvalidScore(u8),

    /// The validation request does not belong to the supplied agent.
    #[error("Validation request does not belong to this agent")]
    RequestMismatch,

    #[error("Insufficient validators: have {have}, need {need}")]
    InsufficientValidators { have: usize, need: usize },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage layer error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CairnError {
    /// Classify this error into the registry's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CairnError::NotOwner
            | CairnError::NotAuthorized
            | CairnError::SelfFeedback
            | CairnError::CannotValidateSelf => ErrorKind::Authorization,
            CairnError::SuspendedState { .. }
            | CairnError::AlreadyActive
            | CairnError::AlreadyInactive
            | CairnError::AgentInactive
            | CairnError::AlreadyResolved => ErrorKind::State,
            CairnError::InvalidInput(_)
            | CairnError::InvalidValue(_)
            | CairnError::InvalidScore(_)
            | CairnError::RequestMismatch => ErrorKind::ValidationInput,
            CairnError::DelegateExists
            | CairnError::DelegateNotFound
            | CairnError::TooManyDelegates { .. }
            | CairnError::DuplicateFeedback
            | CairnError::AlreadyValidated => ErrorKind::Conflict,
            CairnError::InsufficientValidators { .. } => ErrorKind::Consensus,
            CairnError::NotFound(_) | CairnError::Storage(_) | CairnError::Serialization(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}

impl From<serde_json::Error> for CairnError {
    fn from(e: serde_json::Error) -> Self {
        CairnError::Serialization(e.to_string())
    }
}
