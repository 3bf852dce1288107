// crates/cairn-core/src/lib.rs
//
// cairn-core: Core types, traits, and the registry directory for Cairn.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines agent records, feedback receipts, validation requests, the
// directory of owners and global counters, domain events, the error
// taxonomy, and the collaborator traits (clock, event sink, record store).

pub mod agent;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod events;
pub mod feedback;
pub mod identity;
pub mod tier;
pub mod traits;
pub mod validation;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use cairn_core::AgentRecord;`

// Agent types
pub use agent::{
    AgentCategory, AgentProfile, AgentRecord, AuthPolicy, ProfileInput, ProfilePatch,
    MAX_DELEGATES, STARTING_CRED,
};

// Identity types
pub use identity::{AgentId, FeedbackId, Principal, RequestId, SessionId};

// Directory
pub use directory::{Directory, DirectoryCounters, DirectoryDelta, RegistryStats};

// Feedback and validation types
pub use feedback::{FeedbackRecord, FeedbackSentiment};
pub use validation::{ValidationRequest, ValidationResponse, ValidationStatus};

// Tiers
pub use tier::Tier;

// Events
pub use events::{CredReason, DeactivationCause, RegistryEvent};

// Error types
pub use error::{CairnError, ErrorKind};

// Traits
pub use traits::{Clock, EventSink, FixedClock, RecordStore, StoreBatch, SystemClock};
