// crates/cairn-registry/src/lib.rs
//
// cairn-registry: Agent lifecycle operations and the concurrent registry
// facade for Cairn.
//
// `lifecycle` holds the synchronous record operations (register, transfer,
// activation, delegates, profile). `Registry` wraps them, together with
// feedback and validation from the lower crates, behind per-entity locks,
// a pluggable `RecordStore`, and an `EventSink`.

pub mod config;
pub mod lifecycle;
pub mod query;
pub mod registry;
pub mod sink;
pub mod store;

pub use config::{ConfigError, RegistryConfig};
pub use query::{AgentView, ValidationStatusView};
pub use registry::Registry;
pub use sink::{FanoutSink, MemoryEventSink, NullEventSink, TracingEventSink};
pub use store::MemoryStore;

// Inputs callers need to drive the facade.
pub use cairn_consensus::Verdict;
pub use cairn_reputation::FeedbackInput;
