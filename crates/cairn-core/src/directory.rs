// crates/cairn-core/src/directory.rs
//
// The registry directory: owner -> agent index, aggregate counters, and the
// monotonic id counters for feedback receipts and validation requests.
//
// One instance exists per registry. It is injected into every operation that
// touches global state instead of living in ambient statics.
//
// Writers do not mutate the live directory directly. They run against a
// scratch copy holding only the counters and the bucket entry of the agent
// in question (`stage_for` / `stage_counters`), diff it into a
// `DirectoryDelta`, and apply the delta once the change is durable. Deltas
// commute, so concurrent writers may apply in any order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CairnError;
use crate::identity::{AgentId, FeedbackId, Principal, RequestId};

/// Aggregate counts, as exposed to read-only queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_agents: u64,
    pub total_active: u64,
    pub total_feedback: u64,
    pub total_validations: u64,
}

/// Totals plus id high-water marks. This is the part of the directory that
/// is persisted as a single value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCounters {
    pub stats: RegistryStats,
    pub feedback_counter: u64,
    pub validation_counter: u64,
}

impl DirectoryCounters {
    /// Raise the id high-water marks to those in `delta`.
    pub fn reserve_ids(&mut self, delta: &DirectoryDelta) {
        self.feedback_counter = self.feedback_counter.max(delta.feedback_counter);
        self.validation_counter = self.validation_counter.max(delta.validation_counter);
    }

    pub fn apply(&mut self, delta: &DirectoryDelta) {
        let stats = &mut self.stats;
        stats.total_agents = stats.total_agents.saturating_add_signed(delta.total_agents);
        stats.total_active = stats.total_active.saturating_add_signed(delta.total_active);
        stats.total_feedback = stats.total_feedback.saturating_add_signed(delta.total_feedback);
        stats.total_validations = stats
            .total_validations
            .saturating_add_signed(delta.total_validations);
        self.reserve_ids(delta);
    }
}

/// The net effect of one operation on the directory.
///
/// Totals are signed differences, ids are high-water marks, and bucket
/// changes are explicit (owner, agent) unlinks and links. Applying a set of
/// deltas gives the same result in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDelta {
    pub total_agents: i64,
    pub total_active: i64,
    pub total_feedback: i64,
    pub total_validations: i64,
    pub feedback_counter: u64,
    pub validation_counter: u64,
    pub unlinked: Vec<(Principal, AgentId)>,
    pub linked: Vec<(Principal, AgentId)>,
}

/// Owner index plus global counters.
///
/// Invariants:
/// - `total_active <= total_agents`
/// - an owner key is present only while its agent set is non-empty
/// - issued ids are never reused
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    agents_by_owner: HashMap<Principal, HashSet<AgentId>>,
    counters: DirectoryCounters,
}

impl Directory {
    /// Create an empty directory. Called once at registry startup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a directory from persisted counters and owner buckets.
    /// Empty buckets are dropped.
    pub fn from_parts<I>(counters: DirectoryCounters, buckets: I) -> Self
    where
        I: IntoIterator<Item = (Principal, Vec<AgentId>)>,
    {
        let agents_by_owner = buckets
            .into_iter()
            .filter(|(_, agents)| !agents.is_empty())
            .map(|(owner, agents)| (owner, agents.into_iter().collect()))
            .collect();
        Self {
            agents_by_owner,
            counters,
        }
    }

    pub fn stats(&self) -> RegistryStats {
        self.counters.stats
    }

    pub fn counters(&self) -> DirectoryCounters {
        self.counters
    }

    /// Agents currently indexed under `owner`, in no particular order.
    pub fn agents_of(&self, owner: &Principal) -> Vec<AgentId> {
        self.agents_by_owner
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn agent_count_of(&self, owner: &Principal) -> usize {
        self.agents_by_owner.get(owner).map_or(0, HashSet::len)
    }

    /// Whether `owner` has an index bucket at all.
    pub fn has_owner(&self, owner: &Principal) -> bool {
        self.agents_by_owner.contains_key(owner)
    }

    pub fn owns(&self, owner: &Principal, agent: &AgentId) -> bool {
        self.agents_by_owner
            .get(owner)
            .map_or(false, |set| set.contains(agent))
    }

    // -----------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------

    /// Scratch copy with the counters and no buckets.
    pub fn stage_counters(&self) -> Directory {
        Directory {
            agents_by_owner: HashMap::new(),
            counters: self.counters,
        }
    }

    /// Scratch copy with the counters and, if indexed, `agent`'s entry
    /// under `owner`. Operations on one agent touch no other bucket entry.
    pub fn stage_for(&self, owner: &Principal, agent: &AgentId) -> Directory {
        let mut scratch = self.stage_counters();
        if self.owns(owner, agent) {
            scratch
                .agents_by_owner
                .insert(*owner, HashSet::from([*agent]));
        }
        scratch
    }

    /// Difference between this scratch copy and the copy it started as.
    pub fn delta_from(&self, before: &Directory) -> DirectoryDelta {
        let now = self.counters.stats;
        let was = before.counters.stats;
        let diff = |a: u64, b: u64| a as i64 - b as i64;

        let mut delta = DirectoryDelta {
            total_agents: diff(now.total_agents, was.total_agents),
            total_active: diff(now.total_active, was.total_active),
            total_feedback: diff(now.total_feedback, was.total_feedback),
            total_validations: diff(now.total_validations, was.total_validations),
            feedback_counter: self.counters.feedback_counter,
            validation_counter: self.counters.validation_counter,
            ..DirectoryDelta::default()
        };

        let empty = HashSet::new();
        let owners: HashSet<&Principal> = self
            .agents_by_owner
            .keys()
            .chain(before.agents_by_owner.keys())
            .collect();
        for owner in owners {
            let after = self.agents_by_owner.get(owner).unwrap_or(&empty);
            let prior = before.agents_by_owner.get(owner).unwrap_or(&empty);
            delta
                .unlinked
                .extend(prior.difference(after).map(|agent| (*owner, *agent)));
            delta
                .linked
                .extend(after.difference(prior).map(|agent| (*owner, *agent)));
        }
        delta
    }

    /// Keep ids issued by a staged operation from being issued again,
    /// whether or not that operation ends up committed.
    pub fn reserve_ids(&mut self, delta: &DirectoryDelta) {
        self.counters.reserve_ids(delta);
    }

    /// Fold a committed delta into the live directory.
    pub fn apply(&mut self, delta: &DirectoryDelta) {
        self.counters.apply(delta);
        for (owner, agent) in &delta.unlinked {
            self.remove_from_bucket(owner, agent);
        }
        for (owner, agent) in &delta.linked {
            self.agents_by_owner.entry(*owner).or_default().insert(*agent);
        }
    }

    // -----------------------------------------------------------------
    // Mutations used by the domain operations
    // -----------------------------------------------------------------

    /// Index a freshly registered, active agent.
    pub fn link_new_agent(&mut self, owner: Principal, agent: AgentId) {
        self.agents_by_owner.entry(owner).or_default().insert(agent);
        self.counters.stats.total_agents += 1;
        self.counters.stats.total_active += 1;
    }

    /// Remove an agent from its owner's bucket and the totals.
    ///
    /// # Errors
    /// Returns `CairnError::NotFound` if the agent is not indexed under `owner`.
    pub fn unlink_agent(
        &mut self,
        owner: &Principal,
        agent: &AgentId,
        was_active: bool,
    ) -> Result<(), CairnError> {
        if !self.owns(owner, agent) {
            return Err(CairnError::NotFound(format!(
                "agent {} not indexed under owner {}",
                agent,
                owner.short()
            )));
        }
        self.remove_from_bucket(owner, agent);
        let stats = &mut self.counters.stats;
        stats.total_agents = stats.total_agents.saturating_sub(1);
        if was_active {
            stats.total_active = stats.total_active.saturating_sub(1);
        }
        Ok(())
    }

    /// Move an agent between owner buckets. Either both buckets change or neither.
    ///
    /// # Errors
    /// Returns `CairnError::NotFound` if the agent is not indexed under `from`.
    pub fn move_agent(
        &mut self,
        agent: &AgentId,
        from: &Principal,
        to: Principal,
    ) -> Result<(), CairnError> {
        if !self.owns(from, agent) {
            return Err(CairnError::NotFound(format!(
                "agent {} not indexed under owner {}",
                agent,
                from.short()
            )));
        }
        self.remove_from_bucket(from, agent);
        self.agents_by_owner.entry(to).or_default().insert(*agent);
        Ok(())
    }

    fn remove_from_bucket(&mut self, owner: &Principal, agent: &AgentId) {
        if let Some(set) = self.agents_by_owner.get_mut(owner) {
            set.remove(agent);
            if set.is_empty() {
                self.agents_by_owner.remove(owner);
            }
        }
    }

    /// An indexed agent went from active to inactive.
    pub fn note_deactivated(&mut self) {
        let stats = &mut self.counters.stats;
        stats.total_active = stats.total_active.saturating_sub(1);
    }

    /// An indexed agent went from inactive to active.
    pub fn note_reactivated(&mut self) {
        let stats = &mut self.counters.stats;
        if stats.total_active < stats.total_agents {
            stats.total_active += 1;
        }
    }

    /// Issue the next feedback id and count the submission.
    pub fn next_feedback_id(&mut self) -> FeedbackId {
        self.counters.feedback_counter += 1;
        self.counters.stats.total_feedback += 1;
        FeedbackId(self.counters.feedback_counter)
    }

    /// Issue the next validation request id.
    pub fn next_request_id(&mut self) -> RequestId {
        self.counters.validation_counter += 1;
        RequestId(self.counters.validation_counter)
    }

    /// Count a resolved validation.
    pub fn note_validation_resolved(&mut self) {
        self.counters.stats.total_validations += 1;
    }
}
