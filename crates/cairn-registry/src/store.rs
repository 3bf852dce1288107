// crates/cairn-registry/src/store.rs
//
// In-process `RecordStore` backend.
//
// Key format:
//   - `agent:{uuid}`         -> JSON-serialized AgentRecord
//   - `request:{id}`         -> JSON-serialized ValidationRequest
//   - `feedback:{id}`        -> JSON-serialized FeedbackRecord (write-once)
//   - `directory:counters`   -> JSON-serialized DirectoryCounters
//   - `owner:{principal}`    -> JSON array of AgentIds (absent when empty)
//
// Values are stored serialized so the backend behaves like a durable
// key-value store: callers always get an owned copy back. A commit encodes
// and checks everything before touching the map, then writes under a single
// write lock.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use cairn_core::{
    AgentId, AgentRecord, CairnError, Directory, DirectoryCounters, FeedbackId, FeedbackRecord,
    Principal, RecordStore, RequestId, StoreBatch, ValidationRequest,
};

const COUNTERS_KEY: &str = "directory:counters";
const AGENT_PREFIX: &str = "agent:";
const REQUEST_PREFIX: &str = "request:";
const OWNER_PREFIX: &str = "owner:";

/// Hash-map key-value store implementing `RecordStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent_key(id: &AgentId) -> String {
        format!("{}{}", AGENT_PREFIX, id)
    }

    fn request_key(id: RequestId) -> String {
        format!("{}{}", REQUEST_PREFIX, id.0)
    }

    fn feedback_key(id: FeedbackId) -> String {
        format!("feedback:{}", id.0)
    }

    fn owner_key(owner: &Principal) -> String {
        format!("{}{}", OWNER_PREFIX, owner)
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CairnError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: Option<&Vec<u8>>) -> Result<Option<T>, CairnError> {
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_prefixed<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, CairnError> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, bytes)| serde_json::from_slice(bytes).map_err(CairnError::from))
            .collect()
    }

    /// Number of stored entries across all kinds.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn commit(&self, batch: &StoreBatch<'_>) -> Result<(), CairnError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut puts: Vec<(String, Vec<u8>)> = Vec::new();
        for agent in &batch.agents {
            puts.push((Self::agent_key(&agent.id), Self::encode(*agent)?));
        }
        for request in &batch.requests {
            puts.push((Self::request_key(request.request_id), Self::encode(*request)?));
        }
        let mut receipts = Vec::new();
        for feedback in &batch.feedback {
            receipts.push((Self::feedback_key(feedback.feedback_id), Self::encode(*feedback)?));
        }

        let mut entries = self.entries.write().await;
        if let Some((key, _)) = receipts.iter().find(|(key, _)| entries.contains_key(key)) {
            return Err(CairnError::Storage(format!("{} already stored", key)));
        }

        let mut removals = Vec::new();
        if let Some(delta) = batch.directory {
            let mut counters: DirectoryCounters =
                Self::decode(entries.get(COUNTERS_KEY))?.unwrap_or_default();
            counters.apply(delta);
            puts.push((COUNTERS_KEY.to_string(), Self::encode(&counters)?));

            let mut buckets: HashMap<Principal, HashSet<AgentId>> = HashMap::new();
            for (owner, _) in delta.unlinked.iter().chain(delta.linked.iter()) {
                if !buckets.contains_key(owner) {
                    let stored: Vec<AgentId> =
                        Self::decode(entries.get(&Self::owner_key(owner)))?.unwrap_or_default();
                    buckets.insert(*owner, stored.into_iter().collect());
                }
            }
            for (owner, agent) in &delta.unlinked {
                if let Some(set) = buckets.get_mut(owner) {
                    set.remove(agent);
                }
            }
            for (owner, agent) in &delta.linked {
                buckets.entry(*owner).or_default().insert(*agent);
            }
            for (owner, set) in buckets {
                let key = Self::owner_key(&owner);
                if set.is_empty() {
                    removals.push(key);
                } else {
                    let mut agents: Vec<AgentId> = set.into_iter().collect();
                    agents.sort();
                    puts.push((key, Self::encode(&agents)?));
                }
            }
        }

        // Nothing below can fail.
        for (key, bytes) in puts.into_iter().chain(receipts) {
            entries.insert(key, bytes);
        }
        for key in removals {
            entries.remove(&key);
        }
        Ok(())
    }

    async fn get_feedback(&self, id: FeedbackId) -> Result<Option<FeedbackRecord>, CairnError> {
        let entries = self.entries.read().await;
        Self::decode(entries.get(&Self::feedback_key(id)))
    }

    async fn load_agents(&self) -> Result<Vec<AgentRecord>, CairnError> {
        self.load_prefixed(AGENT_PREFIX).await
    }

    async fn load_requests(&self) -> Result<Vec<ValidationRequest>, CairnError> {
        self.load_prefixed(REQUEST_PREFIX).await
    }

    async fn load_directory(&self) -> Result<Directory, CairnError> {
        let entries = self.entries.read().await;
        let counters: DirectoryCounters =
            Self::decode(entries.get(COUNTERS_KEY))?.unwrap_or_default();
        let mut buckets = Vec::new();
        for (key, bytes) in entries.iter() {
            if let Some(hex) = key.strip_prefix(OWNER_PREFIX) {
                let owner: Principal = hex.parse()?;
                let agents: Vec<AgentId> = serde_json::from_slice(bytes)?;
                buckets.push((owner, agents));
            }
        }
        Ok(Directory::from_parts(counters, buckets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::feedback::FeedbackSentiment;
    use cairn_core::{ProfileInput, SessionId};
    use chrono::Utc;

    fn owner() -> Principal {
        Principal([1u8; 32])
    }

    fn make_agent() -> AgentRecord {
        let profile = ProfileInput {
            name: "stored".to_string(),
            uri: "https://stored.example".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        AgentRecord::new(AgentId::now_v7(), owner(), None, profile, Utc::now())
    }

    fn make_feedback(id: u64) -> FeedbackRecord {
        FeedbackRecord {
            feedback_id: FeedbackId(id),
            agent_id: AgentId::now_v7(),
            submitter: Principal([2u8; 32]),
            value: 4,
            sentiment: FeedbackSentiment::Positive,
            tag: "speed".to_string(),
            comment_hash: [7u8; 32],
            session_id: SessionId::from("s"),
            created_at: Utc::now(),
        }
    }

    /// Delta of registering `agent` under `owner()` on an empty directory.
    fn register_delta(agent: &AgentRecord) -> cairn_core::DirectoryDelta {
        let before = Directory::new();
        let mut after = before.clone();
        after.link_new_agent(agent.owner, agent.id);
        after.delta_from(&before)
    }

    #[tokio::test]
    async fn agent_commit_and_overwrite() {
        let store = MemoryStore::new();
        let mut agent = make_agent();
        store.commit(&StoreBatch::new().agent(&agent)).await.unwrap();
        agent.cred_score = 12;
        store.commit(&StoreBatch::new().agent(&agent)).await.unwrap();
        let loaded = store.load_agents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].cred_score, 12);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_store_loads_empty() {
        let store = MemoryStore::new();
        assert!(store.load_agents().await.unwrap().is_empty());
        assert!(store.load_requests().await.unwrap().is_empty());
        assert!(store.get_feedback(FeedbackId(1)).await.unwrap().is_none());
        assert_eq!(store.load_directory().await.unwrap().stats().total_agents, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_receipt_fails_whole_batch() {
        let store = MemoryStore::new();
        store
            .commit(&StoreBatch::new().feedback(&make_feedback(1)))
            .await
            .unwrap();

        let agent = make_agent();
        let delta = register_delta(&agent);
        let receipt = make_feedback(1);
        let batch = StoreBatch::new()
            .agent(&agent)
            .feedback(&receipt)
            .directory(&delta);
        let err = store.commit(&batch).await.unwrap_err();
        assert!(matches!(err, CairnError::Storage(_)));

        // Neither the agent nor the directory change landed.
        assert!(store.load_agents().await.unwrap().is_empty());
        assert_eq!(store.load_directory().await.unwrap().stats().total_agents, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn directory_round_trips_through_deltas() {
        let store = MemoryStore::new();
        let agent = make_agent();
        let delta = register_delta(&agent);
        store
            .commit(&StoreBatch::new().agent(&agent).directory(&delta))
            .await
            .unwrap();

        let dir = store.load_directory().await.unwrap();
        assert_eq!(dir.agents_of(&owner()), vec![agent.id]);
        assert_eq!(dir.stats().total_active, 1);

        // Unregistering empties the bucket and removes its key.
        let before = dir.stage_for(&owner(), &agent.id);
        let mut after = before.clone();
        after.unlink_agent(&owner(), &agent.id, true).unwrap();
        let delta = after.delta_from(&before);
        store
            .commit(&StoreBatch::new().directory(&delta))
            .await
            .unwrap();

        let dir = store.load_directory().await.unwrap();
        assert!(!dir.has_owner(&owner()));
        assert_eq!(dir.stats().total_agents, 0);
        assert!(!store
            .entries
            .read()
            .await
            .contains_key(&MemoryStore::owner_key(&owner())));
    }

    #[test]
    fn key_layout() {
        assert_eq!(MemoryStore::request_key(RequestId(7)), "request:7");
        assert_eq!(MemoryStore::feedback_key(FeedbackId(3)), "feedback:3");
        assert!(MemoryStore::agent_key(&AgentId::nil()).starts_with("agent:"));
        assert!(MemoryStore::owner_key(&owner()).starts_with("owner:0101"));
    }
}
