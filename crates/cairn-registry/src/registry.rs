// crates/cairn-registry/src/registry.rs
//
// Registry: the concurrent facade over the synchronous core operations.
//
// Constructed once at startup (or reopened from a store), then cloned into
// whatever serves requests. Each agent record and each validation request
// sits behind its own mutex, so operations on unrelated entities run
// concurrently. Lock order is always record -> request -> directory.
//
// Every write works on staged copies. The record and request are cloned;
// the directory is staged as a scratch copy holding only the counters and
// the one bucket entry the operation can touch, and reduced to a
// `DirectoryDelta`. The directory lock is held only while staging and while
// applying, never across store I/O. Everything the operation produced goes
// to the store in one atomic commit, and only then are the staged values
// swapped in and the buffered events published. A rejected or unpersisted
// operation leaves nothing behind, in memory or in the store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use cairn_consensus::{Verdict, ValidationParams};
use cairn_core::crypto::ContentHash;
use cairn_core::{
    AgentId, AgentRecord, AuthPolicy, CairnError, Clock, Directory, DirectoryDelta, EventSink,
    FeedbackId, FeedbackRecord, Principal, ProfileInput, ProfilePatch, RecordStore,
    RegistryEvent, RegistryStats, RequestId, StoreBatch, SystemClock, Tier, ValidationRequest,
};
use cairn_reputation::FeedbackInput;

use crate::config::RegistryConfig;
use crate::lifecycle;
use crate::query::{AgentView, ValidationStatusView};
use crate::sink::{NullEventSink, TracingEventSink};
use crate::store::MemoryStore;

type Slot<T> = Arc<Mutex<T>>;

/// Shared handle to one registry instance.
#[derive(Clone)]
pub struct Registry {
    config: RegistryConfig,
    directory: Arc<Mutex<Directory>>,
    agents: Arc<RwLock<HashMap<AgentId, Slot<AgentRecord>>>>,
    requests: Arc<RwLock<HashMap<RequestId, Slot<ValidationRequest>>>>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Create an empty registry with an in-memory store, the system clock,
    /// and no external event sink.
    ///
    /// # Errors
    /// Returns `CairnError::InvalidInput` if the configuration is invalid.
    pub fn new(config: RegistryConfig) -> Result<Self, CairnError> {
        config.validate()?;
        Ok(Self {
            config,
            directory: Arc::new(Mutex::new(Directory::new())),
            agents: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(HashMap::new())),
            store: Arc::new(MemoryStore::new()),
            sink: Arc::new(NullEventSink),
            clock: Arc::new(SystemClock),
        })
    }

    /// Rebuild a registry from everything committed to `store`.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a bad configuration, or whatever the store
    /// reports while loading.
    pub async fn open(config: RegistryConfig, store: Arc<dyn RecordStore>) -> Result<Self, CairnError> {
        let base = Self::new(config)?;
        let directory = store.load_directory().await?;
        let agents: HashMap<AgentId, Slot<AgentRecord>> = store
            .load_agents()
            .await?
            .into_iter()
            .map(|record| (record.id, Arc::new(Mutex::new(record))))
            .collect();
        let requests: HashMap<RequestId, Slot<ValidationRequest>> = store
            .load_requests()
            .await?
            .into_iter()
            .map(|request| (request.request_id, Arc::new(Mutex::new(request))))
            .collect();

        tracing::info!(
            "Opened registry: {} agents ({} indexed), {} validation requests",
            agents.len(),
            directory.stats().total_agents,
            requests.len()
        );
        Ok(Self {
            directory: Arc::new(Mutex::new(directory)),
            agents: Arc::new(RwLock::new(agents)),
            requests: Arc::new(RwLock::new(requests)),
            store,
            ..base
        })
    }

    /// Replace the persistence backend.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn publish(&self, events: &[RegistryEvent]) {
        for event in events {
            if self.config.log_events {
                TracingEventSink.publish(event);
            }
            self.sink.publish(event);
        }
    }

    async fn agent_slot(&self, id: &AgentId) -> Result<Slot<AgentRecord>, CairnError> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CairnError::NotFound(format!("agent {}", id)))
    }

    async fn request_slot(&self, id: RequestId) -> Result<Slot<ValidationRequest>, CairnError> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CairnError::NotFound(format!("validation request {}", id)))
    }

    /// Run `op` against a scratch directory and return its delta.
    ///
    /// `holder` names the one bucket entry the operation may touch. Ids the
    /// operation issues are reserved on the live directory before the lock
    /// drops, so they stay unique whether or not the commit succeeds.
    async fn stage_directory<T, F>(
        &self,
        holder: Option<(&Principal, &AgentId)>,
        op: F,
    ) -> Result<(T, DirectoryDelta), CairnError>
    where
        F: FnOnce(&mut Directory) -> Result<T, CairnError>,
    {
        let mut live = self.directory.lock().await;
        let before = match holder {
            Some((owner, agent)) => live.stage_for(owner, agent),
            None => live.stage_counters(),
        };
        let mut scratch = before.clone();
        let out = op(&mut scratch)?;
        let delta = scratch.delta_from(&before);
        live.reserve_ids(&delta);
        Ok((out, delta))
    }

    async fn apply_directory(&self, delta: &DirectoryDelta) {
        self.directory.lock().await.apply(delta);
    }

    /// Run `op` against a staged record and scratch directory, commit both,
    /// then swap in and publish.
    async fn with_agent_and_directory<T, F>(&self, id: AgentId, op: F) -> Result<T, CairnError>
    where
        F: FnOnce(
            &mut AgentRecord,
            &mut Directory,
            DateTime<Utc>,
            &mut Vec<RegistryEvent>,
        ) -> Result<T, CairnError>,
    {
        let slot = self.agent_slot(&id).await?;
        let mut record = slot.lock().await;

        let mut staged = record.clone();
        let mut events = Vec::new();
        let now = self.clock.now();
        let (out, delta) = self
            .stage_directory(Some((&record.owner, &record.id)), |directory| {
                op(&mut staged, directory, now, &mut events)
            })
            .await?;

        let batch = StoreBatch::new().agent(&staged).directory(&delta);
        self.store.commit(&batch).await?;
        self.apply_directory(&delta).await;
        *record = staged;
        self.publish(&events);
        Ok(out)
    }

    /// Like `with_agent_and_directory` for operations that leave the
    /// directory alone.
    async fn with_agent<T, F>(&self, id: AgentId, op: F) -> Result<T, CairnError>
    where
        F: FnOnce(&mut AgentRecord, DateTime<Utc>, &mut Vec<RegistryEvent>) -> Result<T, CairnError>,
    {
        let slot = self.agent_slot(&id).await?;
        let mut record = slot.lock().await;

        let mut staged = record.clone();
        let mut events = Vec::new();
        let out = op(&mut staged, self.clock.now(), &mut events)?;

        self.store.commit(&StoreBatch::new().agent(&staged)).await?;
        *record = staged;
        self.publish(&events);
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Identity records
    // -----------------------------------------------------------------

    /// Register a new agent owned by `owner`.
    pub async fn register(
        &self,
        owner: Principal,
        wallet: Option<Principal>,
        profile: ProfileInput,
    ) -> Result<AgentRecord, CairnError> {
        let mut events = Vec::new();
        let now = self.clock.now();
        let (record, delta) = self
            .stage_directory(None, |directory| {
                lifecycle::register(directory, owner, wallet, profile, now, &mut events)
            })
            .await?;

        let batch = StoreBatch::new().agent(&record).directory(&delta);
        self.store.commit(&batch).await?;
        // Index first: nothing can address the agent until it is in the map.
        self.apply_directory(&delta).await;
        self.agents
            .write()
            .await
            .insert(record.id, Arc::new(Mutex::new(record.clone())));
        self.publish(&events);
        Ok(record)
    }

    pub async fn transfer_ownership(
        &self,
        caller: Principal,
        id: AgentId,
        new_owner: Principal,
    ) -> Result<(), CairnError> {
        self.with_agent_and_directory(id, |record, directory, now, events| {
            lifecycle::transfer_ownership(record, directory, caller, new_owner, now, events)
        })
        .await
    }

    pub async fn deactivate(&self, caller: Principal, id: AgentId) -> Result<(), CairnError> {
        self.with_agent_and_directory(id, |record, directory, now, events| {
            lifecycle::deactivate(record, directory, caller, now, events)
        })
        .await
    }

    pub async fn reactivate(&self, caller: Principal, id: AgentId) -> Result<(), CairnError> {
        self.with_agent_and_directory(id, |record, directory, now, events| {
            lifecycle::reactivate(record, directory, caller, now, events)
        })
        .await
    }

    /// Unlink the agent from the directory. The record stays queryable.
    pub async fn unregister(&self, caller: Principal, id: AgentId) -> Result<(), CairnError> {
        self.with_agent_and_directory(id, |record, directory, now, events| {
            lifecycle::unregister(record, directory, caller, now, events)
        })
        .await
    }

    pub async fn add_delegate(
        &self,
        caller: Principal,
        id: AgentId,
        delegate: Principal,
    ) -> Result<(), CairnError> {
        let max = self.config.max_delegates;
        self.with_agent(id, |record, now, events| {
            lifecycle::add_delegate(record, caller, delegate, max, now, events)
        })
        .await
    }

    pub async fn remove_delegate(
        &self,
        caller: Principal,
        id: AgentId,
        delegate: Principal,
    ) -> Result<(), CairnError> {
        self.with_agent(id, |record, now, events| {
            lifecycle::remove_delegate(record, caller, delegate, now, events)
        })
        .await
    }

    pub async fn update_profile(
        &self,
        caller: Principal,
        id: AgentId,
        patch: ProfilePatch,
    ) -> Result<Vec<&'static str>, CairnError> {
        self.with_agent(id, |record, now, events| {
            lifecycle::update_profile(record, caller, patch, now, events)
        })
        .await
    }

    pub async fn set_wallet(
        &self,
        caller: Principal,
        id: AgentId,
        wallet: Principal,
    ) -> Result<(), CairnError> {
        self.with_agent(id, |record, now, events| {
            lifecycle::set_wallet(record, caller, wallet, now, events)
        })
        .await
    }

    /// Count a completed session. Returns the new session total.
    pub async fn record_session(&self, caller: Principal, id: AgentId) -> Result<u64, CairnError> {
        self.with_agent(id, |record, now, events| {
            lifecycle::record_session(record, caller, now, events)
        })
        .await
    }

    // -----------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------

    /// Apply feedback. The record, the receipt, and the directory change
    /// are committed together.
    pub async fn submit_feedback(
        &self,
        submitter: Principal,
        id: AgentId,
        input: FeedbackInput,
    ) -> Result<FeedbackRecord, CairnError> {
        let slot = self.agent_slot(&id).await?;
        let mut record = slot.lock().await;

        let mut staged = record.clone();
        let mut events = Vec::new();
        let now = self.clock.now();
        let (receipt, delta) = self
            .stage_directory(Some((&record.owner, &record.id)), |directory| {
                cairn_reputation::submit_feedback(
                    &mut staged,
                    directory,
                    submitter,
                    input,
                    now,
                    &mut events,
                )
            })
            .await?;

        let batch = StoreBatch::new()
            .agent(&staged)
            .feedback(&receipt)
            .directory(&delta);
        self.store.commit(&batch).await?;
        self.apply_directory(&delta).await;
        *record = staged;
        self.publish(&events);
        Ok(receipt)
    }

    // -----------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------

    /// Open a validation request for an agent. Owner only.
    pub async fn request_validation(
        &self,
        requester: Principal,
        id: AgentId,
        request_uri: String,
        request_hash: ContentHash,
    ) -> Result<ValidationRequest, CairnError> {
        let slot = self.agent_slot(&id).await?;
        let record = slot.lock().await;

        let mut events = Vec::new();
        let now = self.clock.now();
        let (request, delta) = self
            .stage_directory(None, |directory| {
                cairn_consensus::request_validation(
                    &record,
                    directory,
                    requester,
                    request_uri,
                    request_hash,
                    now,
                    &mut events,
                )
            })
            .await?;

        let batch = StoreBatch::new().request(&request).directory(&delta);
        self.store.commit(&batch).await?;
        self.apply_directory(&delta).await;
        self.requests
            .write()
            .await
            .insert(request.request_id, Arc::new(Mutex::new(request.clone())));
        self.publish(&events);
        Ok(request)
    }

    /// Append a validator's score to a pending request.
    pub async fn submit_validation(
        &self,
        validator: Principal,
        request_id: RequestId,
        score: u8,
        tag: String,
    ) -> Result<(), CairnError> {
        let slot = self.request_slot(request_id).await?;
        let mut request = slot.lock().await;

        let mut staged = request.clone();
        let mut events = Vec::new();
        cairn_consensus::submit_validation(
            &mut staged,
            validator,
            score,
            tag,
            self.clock.now(),
            &mut events,
        )?;

        self.store.commit(&StoreBatch::new().request(&staged)).await?;
        *request = staged;
        self.publish(&events);
        Ok(())
    }

    /// Resolve a request once the quorum is met and apply the cred outcome.
    pub async fn resolve_validation(
        &self,
        resolver: Principal,
        request_id: RequestId,
    ) -> Result<Verdict, CairnError> {
        let request_slot = self.request_slot(request_id).await?;
        // agent_id never changes, so reading it ahead of the ordered locks is safe.
        let agent_id = request_slot.lock().await.agent_id;
        let agent_slot = self.agent_slot(&agent_id).await?;

        let mut record = agent_slot.lock().await;
        let mut request = request_slot.lock().await;

        let mut staged_record = record.clone();
        let mut staged_request = request.clone();
        let mut events = Vec::new();
        let now = self.clock.now();
        let params = ValidationParams::new(self.config.validation_quorum);
        let (verdict, delta) = self
            .stage_directory(Some((&record.owner, &record.id)), |directory| {
                cairn_consensus::resolve_validation(
                    &mut staged_record,
                    &mut staged_request,
                    directory,
                    resolver,
                    params,
                    now,
                    &mut events,
                )
            })
            .await?;

        let batch = StoreBatch::new()
            .agent(&staged_record)
            .request(&staged_request)
            .directory(&delta);
        self.store.commit(&batch).await?;
        self.apply_directory(&delta).await;
        *record = staged_record;
        *request = staged_request;
        self.publish(&events);
        Ok(verdict)
    }

    // -----------------------------------------------------------------
    // Queries (read-only)
    // -----------------------------------------------------------------

    /// Full copy of an agent record, including unregistered ones.
    pub async fn record(&self, id: AgentId) -> Result<AgentRecord, CairnError> {
        let slot = self.agent_slot(&id).await?;
        let record = slot.lock().await;
        Ok(record.clone())
    }

    pub async fn agent(&self, id: AgentId) -> Result<AgentView, CairnError> {
        let slot = self.agent_slot(&id).await?;
        let record = slot.lock().await;
        Ok(AgentView::from(&*record))
    }

    pub async fn cred_of(&self, id: AgentId) -> Result<u8, CairnError> {
        Ok(self.agent(id).await?.cred_score)
    }

    pub async fn tier_of(&self, id: AgentId) -> Result<Tier, CairnError> {
        Ok(self.agent(id).await?.tier)
    }

    pub async fn is_active(&self, id: AgentId) -> Result<bool, CairnError> {
        Ok(self.agent(id).await?.is_active)
    }

    /// Whether `principal` may act for the agent under `policy`.
    pub async fn is_authorized(
        &self,
        id: AgentId,
        principal: &Principal,
        policy: AuthPolicy,
    ) -> Result<bool, CairnError> {
        let slot = self.agent_slot(&id).await?;
        let record = slot.lock().await;
        Ok(record.is_authorized_with(policy, principal))
    }

    pub async fn agents_of(&self, owner: &Principal) -> Vec<AgentId> {
        self.directory.lock().await.agents_of(owner)
    }

    pub async fn agent_count_of(&self, owner: &Principal) -> usize {
        self.directory.lock().await.agent_count_of(owner)
    }

    pub async fn stats(&self) -> RegistryStats {
        self.directory.lock().await.stats()
    }

    pub async fn validation_request(
        &self,
        request_id: RequestId,
    ) -> Result<ValidationRequest, CairnError> {
        let slot = self.request_slot(request_id).await?;
        let request = slot.lock().await;
        Ok(request.clone())
    }

    pub async fn validation_status(
        &self,
        request_id: RequestId,
    ) -> Result<ValidationStatusView, CairnError> {
        let slot = self.request_slot(request_id).await?;
        let request = slot.lock().await;
        Ok(ValidationStatusView::from(&*request))
    }

    /// A stored feedback receipt.
    pub async fn feedback(&self, id: FeedbackId) -> Result<Option<FeedbackRecord>, CairnError> {
        self.store.get_feedback(id).await
    }
}
