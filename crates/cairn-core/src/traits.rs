// crates/cairn-core/src/traits.rs

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::agent::AgentRecord;
use crate::directory::{Directory, DirectoryDelta};
use crate::error::CairnError;
use crate::events::RegistryEvent;
use crate::feedback::FeedbackRecord;
use crate::identity::FeedbackId;
use crate::validation::ValidationRequest;

/// Source of operation timestamps. Must be non-decreasing.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receives domain events after an operation commits.
///
/// Implemented by cairn-registry (tracing and in-memory sinks).
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &RegistryEvent);
}

/// Everything one operation writes, committed as a unit.
///
/// Borrowed from the staged entities so building a batch copies nothing.
#[derive(Debug, Default)]
pub struct StoreBatch<'a> {
    pub agents: Vec<&'a AgentRecord>,
    pub requests: Vec<&'a ValidationRequest>,
    /// Receipts are write-once.
    pub feedback: Vec<&'a FeedbackRecord>,
    pub directory: Option<&'a DirectoryDelta>,
}

impl<'a> StoreBatch<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, agent: &'a AgentRecord) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn request(mut self, request: &'a ValidationRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn feedback(mut self, feedback: &'a FeedbackRecord) -> Self {
        self.feedback.push(feedback);
        self
    }

    /// Attach the operation's directory delta.
    pub fn directory(mut self, delta: &'a DirectoryDelta) -> Self {
        self.directory = Some(delta);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
            && self.requests.is_empty()
            && self.feedback.is_empty()
            && self.directory.is_none()
    }
}

/// Trait for durable storage of registry entities.
///
/// Implemented by cairn-registry (in-memory backend). `commit` must be
/// all-or-nothing: a failed commit leaves every stored value as it was.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically write every entity in the batch and fold in its
    /// directory delta. Fails without writing if a receipt already exists.
    async fn commit(&self, batch: &StoreBatch<'_>) -> Result<(), CairnError>;

    /// Retrieve a feedback receipt by ID.
    async fn get_feedback(&self, id: FeedbackId) -> Result<Option<FeedbackRecord>, CairnError>;

    /// Every stored agent record, in no particular order.
    async fn load_agents(&self) -> Result<Vec<AgentRecord>, CairnError>;

    /// Every stored validation request, in no particular order.
    async fn load_requests(&self) -> Result<Vec<ValidationRequest>, CairnError>;

    /// The persisted directory, or an empty one if nothing was committed yet.
    async fn load_directory(&self) -> Result<Directory, CairnError>;
}
