// crates/cairn-reputation/src/tier_change.rs
//
// Cred mutation and its tier side effects.
//
// After every cred change the old and new tiers are compared. Crossing into
// Suspended while active deactivates the record and decrements the
// directory's active count inside the same call. Event order is
// CredUpdated -> TierChanged -> RecordDeactivated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cairn_core::directory::Directory;
use cairn_core::events::{CredReason, DeactivationCause, RegistryEvent};
use cairn_core::tier::Tier;
use cairn_core::AgentRecord;

use crate::policy::{
    clamp_add, clamp_sub, NEGATIVE_FEEDBACK_PENALTY, POSITIVE_FEEDBACK_REWARD,
    VALIDATION_FAIL_PENALTY, VALIDATION_PASS_REWARD,
};

/// A signed, saturating cred adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredChange {
    Increase(u8),
    Decrease(u8),
}

impl CredChange {
    /// The adjustment the policy prescribes for `reason`.
    pub fn for_reason(reason: CredReason) -> Self {
        match reason {
            CredReason::PositiveFeedback => CredChange::Increase(POSITIVE_FEEDBACK_REWARD),
            CredReason::NegativeFeedback => CredChange::Decrease(NEGATIVE_FEEDBACK_PENALTY),
            CredReason::ValidationPassed => CredChange::Increase(VALIDATION_PASS_REWARD),
            CredReason::ValidationFailed => CredChange::Decrease(VALIDATION_FAIL_PENALTY),
        }
    }

    pub fn apply(self, cred: u8) -> u8 {
        match self {
            CredChange::Increase(delta) => clamp_add(cred, delta),
            CredChange::Decrease(delta) => clamp_sub(cred, delta),
        }
    }
}

/// What a cred mutation did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredOutcome {
    pub old_cred: u8,
    pub new_cred: u8,
    pub old_tier: Tier,
    pub new_tier: Tier,
    /// The record was active and has just been forced inactive.
    pub auto_suspended: bool,
}

impl CredOutcome {
    pub fn tier_changed(&self) -> bool {
        self.old_tier != self.new_tier
    }
}

/// Apply the policy adjustment for `reason` to `record` and run tier handling.
///
/// Infallible: callers validate their preconditions before calling, so the
/// cred change and any suspension always land together.
pub fn apply_cred_change(
    record: &mut AgentRecord,
    directory: &mut Directory,
    reason: CredReason,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> CredOutcome {
    let old_cred = record.cred_score;
    let new_cred = CredChange::for_reason(reason).apply(old_cred);
    let old_tier = Tier::from_cred(old_cred);
    let new_tier = Tier::from_cred(new_cred);

    let mut outcome = CredOutcome {
        old_cred,
        new_cred,
        old_tier,
        new_tier,
        auto_suspended: false,
    };

    // Saturated at a bound: nothing moved.
    if old_cred == new_cred {
        return outcome;
    }

    record.cred_score = new_cred;
    record.updated_at = now;
    events.push(RegistryEvent::CredUpdated {
        agent_id: record.id,
        old_cred,
        new_cred,
        reason,
    });

    if old_tier == new_tier {
        return outcome;
    }

    events.push(RegistryEvent::TierChanged {
        agent_id: record.id,
        old_tier,
        new_tier,
    });
    tracing::debug!(
        "Agent {} tier {} -> {} (cred {} -> {})",
        record.id,
        old_tier,
        new_tier,
        old_cred,
        new_cred
    );

    if new_tier.is_suspended() && record.is_active {
        record.is_active = false;
        directory.note_deactivated();
        outcome.auto_suspended = true;
        events.push(RegistryEvent::RecordDeactivated {
            agent_id: record.id,
            cause: DeactivationCause::AutoSuspended,
            at: now,
        });
        tracing::warn!(
            "Agent {} auto-suspended: cred fell to {} ({:?})",
            record.id,
            new_cred,
            reason
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{AgentId, Principal, ProfileInput};

    fn make_record(dir: &mut Directory, cred: u8) -> AgentRecord {
        let profile = ProfileInput {
            name: "watcher".to_string(),
            uri: "https://watcher.example".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let mut record = AgentRecord::new(
            AgentId::now_v7(),
            Principal([1u8; 32]),
            None,
            profile,
            Utc::now(),
        );
        dir.link_new_agent(record.owner, record.id);
        record.cred_score = cred;
        record
    }

    #[test]
    fn same_tier_emits_only_cred_update() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 70);
        let mut events = Vec::new();
        let out = apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::PositiveFeedback,
            Utc::now(),
            &mut events,
        );
        assert_eq!(out.new_cred, 71);
        assert!(!out.tier_changed());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "cred_updated");
    }

    #[test]
    fn crossing_tier_emits_in_order() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 70);
        let mut events = Vec::new();
        apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::NegativeFeedback,
            Utc::now(),
            &mut events,
        );
        assert_eq!(record.cred_score, 67);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["cred_updated", "tier_changed"]);
        assert!(record.is_active);
    }

    #[test]
    fn falling_into_suspended_deactivates() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 35);
        let mut events = Vec::new();
        let out = apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::ValidationFailed,
            Utc::now(),
            &mut events,
        );
        assert_eq!(out.new_cred, 25);
        assert!(out.auto_suspended);
        assert!(!record.is_active);
        assert_eq!(dir.stats().total_active, 0);
        assert_eq!(dir.stats().total_agents, 1);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["cred_updated", "tier_changed", "record_deactivated"]);
    }

    #[test]
    fn already_inactive_is_not_counted_twice() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 32);
        record.is_active = false;
        dir.note_deactivated();
        let mut events = Vec::new();
        let out = apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::NegativeFeedback,
            Utc::now(),
            &mut events,
        );
        assert!(!out.auto_suspended);
        assert_eq!(dir.stats().total_active, 0);
    }

    #[test]
    fn saturated_change_is_silent() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 0);
        record.is_active = false;
        let mut events = Vec::new();
        apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::ValidationFailed,
            Utc::now(),
            &mut events,
        );
        assert_eq!(record.cred_score, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn rising_out_of_suspended_does_not_reactivate() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir, 29);
        record.is_active = false;
        dir.note_deactivated();
        let mut events = Vec::new();
        apply_cred_change(
            &mut record,
            &mut dir,
            CredReason::ValidationPassed,
            Utc::now(),
            &mut events,
        );
        assert_eq!(record.tier(), Tier::Probation);
        assert!(!record.is_active);
    }
}
