// crates/cairn-registry/src/lifecycle.rs
//
// Identity record operations: registration, ownership, activation,
// delegates, profile, wallet, and session bookkeeping.
//
// Each operation checks every precondition before its first write, and
// appends its events in mutation order.

use chrono::{DateTime, Utc};

use cairn_core::events::{DeactivationCause, RegistryEvent};
use cairn_core::{
    AgentId, AgentRecord, CairnError, Directory, Principal, ProfileInput, ProfilePatch,
    MAX_DELEGATES,
};

/// Create a new active record at starting cred and index it under `owner`.
///
/// # Errors
/// Returns `CairnError::InvalidInput` if the profile violates a constraint.
pub fn register(
    directory: &mut Directory,
    owner: Principal,
    wallet: Option<Principal>,
    profile: ProfileInput,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<AgentRecord, CairnError> {
    let profile = profile.validate()?;
    let record = AgentRecord::new(AgentId::now_v7(), owner, wallet, profile, now);
    directory.link_new_agent(owner, record.id);

    events.push(RegistryEvent::RecordCreated {
        agent_id: record.id,
        owner,
        wallet: record.wallet,
        at: now,
    });
    tracing::info!(
        "Registered agent {} ({:?}) for owner {}",
        record.id,
        record.profile.name,
        owner.short()
    );
    Ok(record)
}

/// Hand the record to `new_owner`. The delegate set does not carry over.
///
/// # Errors
/// - `NotOwner` unless `caller` is the current owner.
/// - `InvalidInput` if `new_owner` already owns the record.
/// - `NotFound` if the record has been unregistered.
pub fn transfer_ownership(
    record: &mut AgentRecord,
    directory: &mut Directory,
    caller: Principal,
    new_owner: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    if new_owner == record.owner {
        return Err(CairnError::InvalidInput(
            "new owner already owns this agent".to_string(),
        ));
    }

    let old_owner = record.owner;
    directory.move_agent(&record.id, &old_owner, new_owner)?;
    record.owner = new_owner;
    record.delegates.clear();
    record.updated_at = now;

    events.push(RegistryEvent::OwnershipTransferred {
        agent_id: record.id,
        old_owner,
        new_owner,
        at: now,
    });
    tracing::info!(
        "Agent {} transferred {} -> {}",
        record.id,
        old_owner.short(),
        new_owner.short()
    );
    Ok(())
}

/// Owner-initiated deactivation.
pub fn deactivate(
    record: &mut AgentRecord,
    directory: &mut Directory,
    caller: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    if !record.is_active {
        return Err(CairnError::AlreadyInactive);
    }

    record.is_active = false;
    record.updated_at = now;
    directory.note_deactivated();
    events.push(RegistryEvent::RecordDeactivated {
        agent_id: record.id,
        cause: DeactivationCause::Owner,
        at: now,
    });
    tracing::info!("Agent {} deactivated by owner", record.id);
    Ok(())
}

/// Owner-initiated reactivation. Refused while cred sits in Suspended.
///
/// # Errors
/// - `NotOwner`, `AlreadyActive`, `SuspendedState`.
/// - `NotFound` if the record has been unregistered.
pub fn reactivate(
    record: &mut AgentRecord,
    directory: &mut Directory,
    caller: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    if record.is_active {
        return Err(CairnError::AlreadyActive);
    }
    if record.tier().is_suspended() {
        return Err(CairnError::SuspendedState {
            cred: record.cred_score,
        });
    }
    if !directory.owns(&record.owner, &record.id) {
        return Err(CairnError::NotFound(format!(
            "agent {} is unregistered",
            record.id
        )));
    }

    record.is_active = true;
    record.updated_at = now;
    directory.note_reactivated();
    events.push(RegistryEvent::RecordReactivated {
        agent_id: record.id,
        at: now,
    });
    tracing::info!("Agent {} reactivated (cred {})", record.id, record.cred_score);
    Ok(())
}

/// Deactivate and unlink the record from the directory. The record itself
/// is kept for historical lookups.
///
/// # Errors
/// - `NotOwner` unless `caller` owns the record.
/// - `NotFound` if the record is already unregistered.
pub fn unregister(
    record: &mut AgentRecord,
    directory: &mut Directory,
    caller: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    let was_active = record.is_active;
    directory.unlink_agent(&record.owner, &record.id, was_active)?;

    record.is_active = false;
    record.unregistered_at = Some(now);
    record.updated_at = now;
    if was_active {
        events.push(RegistryEvent::RecordDeactivated {
            agent_id: record.id,
            cause: DeactivationCause::Unregistered,
            at: now,
        });
    }
    events.push(RegistryEvent::RecordRemoved {
        agent_id: record.id,
        owner: record.owner,
        at: now,
    });
    tracing::info!("Agent {} unregistered by {}", record.id, caller.short());
    Ok(())
}

/// Grant `delegate` limited authority. `max` is capped at `MAX_DELEGATES`.
///
/// # Errors
/// - `NotOwner`, `NotFound` (unregistered), `DelegateExists`, `TooManyDelegates`.
pub fn add_delegate(
    record: &mut AgentRecord,
    caller: Principal,
    delegate: Principal,
    max: usize,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    if record.is_delegate(&delegate) {
        return Err(CairnError::DelegateExists);
    }
    let max = max.min(MAX_DELEGATES);
    if record.delegates.len() >= max {
        return Err(CairnError::TooManyDelegates { max });
    }

    record.delegates.push(delegate);
    record.updated_at = now;
    events.push(RegistryEvent::DelegateAdded {
        agent_id: record.id,
        delegate,
    });
    Ok(())
}

/// Revoke a delegate.
///
/// # Errors
/// - `NotOwner`, `NotFound` (unregistered), `DelegateNotFound`.
pub fn remove_delegate(
    record: &mut AgentRecord,
    caller: Principal,
    delegate: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    let idx = record
        .delegates
        .iter()
        .position(|d| *d == delegate)
        .ok_or(CairnError::DelegateNotFound)?;

    record.delegates.remove(idx);
    record.updated_at = now;
    events.push(RegistryEvent::DelegateRemoved {
        agent_id: record.id,
        delegate,
    });
    Ok(())
}

/// Apply a profile patch. Owner or delegate only.
///
/// Returns the names of fields that actually changed.
pub fn update_profile(
    record: &mut AgentRecord,
    caller: Principal,
    patch: ProfilePatch,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<Vec<&'static str>, CairnError> {
    if !record.is_owner(&caller) && !record.is_delegate(&caller) {
        return Err(CairnError::NotAuthorized);
    }
    record.require_registered()?;
    let (profile, changed) = patch.apply_to(&record.profile)?;
    if changed.is_empty() {
        return Ok(changed);
    }

    record.profile = profile;
    record.updated_at = now;
    for field in &changed {
        events.push(RegistryEvent::RecordFieldUpdated {
            agent_id: record.id,
            field: (*field).to_string(),
            at: now,
        });
    }
    Ok(changed)
}

/// Point payments at a new wallet. Owner only.
pub fn set_wallet(
    record: &mut AgentRecord,
    caller: Principal,
    wallet: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    record.require_owner(&caller)?;
    record.require_registered()?;
    if record.wallet == wallet {
        return Ok(());
    }
    record.wallet = wallet;
    record.updated_at = now;
    events.push(RegistryEvent::RecordFieldUpdated {
        agent_id: record.id,
        field: "wallet".to_string(),
        at: now,
    });
    Ok(())
}

/// Count one completed interaction. Requires an active record and an
/// authorized caller (owner, wallet, or delegate).
///
/// # Errors
/// - `NotAuthorized`, `NotFound` (unregistered), `AgentInactive`.
pub fn record_session(
    record: &mut AgentRecord,
    caller: Principal,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<u64, CairnError> {
    if !record.is_authorized(&caller) {
        return Err(CairnError::NotAuthorized);
    }
    record.require_registered()?;
    if !record.is_active {
        return Err(CairnError::AgentInactive);
    }

    record.total_sessions += 1;
    record.last_session_at = Some(now);
    record.updated_at = now;
    events.push(RegistryEvent::SessionRecorded {
        agent_id: record.id,
        total_sessions: record.total_sessions,
        at: now,
    });
    Ok(record.total_sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{Tier, STARTING_CRED};

    fn owner() -> Principal {
        Principal([1u8; 32])
    }

    fn other(n: u8) -> Principal {
        Principal([20 + n; 32])
    }

    fn profile() -> ProfileInput {
        ProfileInput {
            name: "lifecycle".to_string(),
            uri: "https://lifecycle.example".to_string(),
            category: 1,
            metadata_keys: vec![],
            metadata_values: vec![],
        }
    }

    fn setup() -> (Directory, AgentRecord, Vec<RegistryEvent>) {
        let mut dir = Directory::new();
        let mut events = Vec::new();
        let record = register(&mut dir, owner(), None, profile(), Utc::now(), &mut events).unwrap();
        (dir, record, events)
    }

    #[test]
    fn register_indexes_and_counts() {
        let (dir, record, events) = setup();
        assert_eq!(record.cred_score, STARTING_CRED);
        assert!(record.is_active);
        assert_eq!(dir.agents_of(&owner()), vec![record.id]);
        assert_eq!(dir.stats().total_agents, 1);
        assert_eq!(dir.stats().total_active, 1);
        assert_eq!(events[0].kind(), "record_created");
    }

    #[test]
    fn register_rejects_invalid_profile_without_indexing() {
        let mut dir = Directory::new();
        let mut events = Vec::new();
        let mut bad = profile();
        bad.category = 42;
        let err = register(&mut dir, owner(), None, bad, Utc::now(), &mut events);
        assert!(matches!(err, Err(CairnError::InvalidInput(_))));
        assert!(!dir.has_owner(&owner()));
        assert_eq!(dir.stats().total_agents, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn transfer_moves_bucket_and_clears_delegates() {
        let (mut dir, mut record, mut events) = setup();
        add_delegate(&mut record, owner(), other(1), MAX_DELEGATES, Utc::now(), &mut events).unwrap();

        transfer_ownership(&mut record, &mut dir, owner(), other(2), Utc::now(), &mut events).unwrap();
        assert_eq!(record.owner, other(2));
        assert!(record.delegates.is_empty());
        assert!(!dir.has_owner(&owner()));
        assert_eq!(dir.agents_of(&other(2)), vec![record.id]);
    }

    #[test]
    fn transfer_requires_owner() {
        let (mut dir, mut record, mut events) = setup();
        let err = transfer_ownership(&mut record, &mut dir, other(1), other(2), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::NotOwner);
        assert!(dir.owns(&owner(), &record.id));
    }

    #[test]
    fn deactivate_reactivate_cycle() {
        let (mut dir, mut record, mut events) = setup();
        deactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        assert_eq!(dir.stats().total_active, 0);
        assert_eq!(
            deactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap_err(),
            CairnError::AlreadyInactive
        );

        reactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        assert_eq!(dir.stats().total_active, 1);
        assert_eq!(
            reactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap_err(),
            CairnError::AlreadyActive
        );
    }

    #[test]
    fn suspended_agent_cannot_reactivate() {
        let (mut dir, mut record, mut events) = setup();
        deactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        record.cred_score = 29;
        assert_eq!(record.tier(), Tier::Suspended);
        assert_eq!(
            reactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap_err(),
            CairnError::SuspendedState { cred: 29 }
        );
        record.cred_score = 30;
        reactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
    }

    #[test]
    fn unregister_keeps_record_but_unlinks() {
        let (mut dir, mut record, mut events) = setup();
        events.clear();
        unregister(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        assert!(!record.is_active);
        assert!(!dir.has_owner(&owner()));
        assert_eq!(dir.stats().total_agents, 0);
        assert_eq!(dir.stats().total_active, 0);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["record_deactivated", "record_removed"]);

        assert!(matches!(
            unregister(&mut record, &mut dir, owner(), Utc::now(), &mut events),
            Err(CairnError::NotFound(_))
        ));
        assert!(matches!(
            reactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events),
            Err(CairnError::NotFound(_))
        ));
    }

    #[test]
    fn unregistered_record_rejects_further_changes() {
        let (mut dir, mut record, mut events) = setup();
        unregister(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        let frozen = record.clone();
        events.clear();

        let now = Utc::now();
        let results = vec![
            add_delegate(&mut record, owner(), other(1), MAX_DELEGATES, now, &mut events),
            remove_delegate(&mut record, owner(), other(1), now, &mut events),
            update_profile(
                &mut record,
                owner(),
                ProfilePatch {
                    name: Some("ghost".to_string()),
                    ..Default::default()
                },
                now,
                &mut events,
            )
            .map(|_| ()),
            set_wallet(&mut record, owner(), other(2), now, &mut events),
            record_session(&mut record, owner(), now, &mut events).map(|_| ()),
            deactivate(&mut record, &mut dir, owner(), now, &mut events),
            transfer_ownership(&mut record, &mut dir, owner(), other(3), now, &mut events),
        ];
        for result in results {
            assert!(matches!(result, Err(CairnError::NotFound(_))));
        }
        assert!(events.is_empty());
        assert_eq!(record.profile, frozen.profile);
        assert_eq!(record.wallet, frozen.wallet);
        assert!(record.delegates.is_empty());
        assert!(record.unregistered_at.is_some());
    }

    #[test]
    fn unregister_inactive_agent_leaves_active_total() {
        let mut dir = Directory::new();
        let mut events = Vec::new();
        let mut a = register(&mut dir, owner(), None, profile(), Utc::now(), &mut events).unwrap();
        let _b = register(&mut dir, owner(), None, profile(), Utc::now(), &mut events).unwrap();
        deactivate(&mut a, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        unregister(&mut a, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        assert_eq!(dir.stats().total_agents, 1);
        assert_eq!(dir.stats().total_active, 1);
        assert_eq!(dir.agent_count_of(&owner()), 1);
    }

    #[test]
    fn delegate_bounds_and_conflicts() {
        let (_dir, mut record, mut events) = setup();
        for n in 0..MAX_DELEGATES as u8 {
            add_delegate(&mut record, owner(), other(n), MAX_DELEGATES, Utc::now(), &mut events).unwrap();
        }
        assert_eq!(
            add_delegate(&mut record, owner(), other(0), MAX_DELEGATES, Utc::now(), &mut events).unwrap_err(),
            CairnError::DelegateExists
        );
        assert_eq!(
            add_delegate(&mut record, owner(), other(99), MAX_DELEGATES, Utc::now(), &mut events).unwrap_err(),
            CairnError::TooManyDelegates { max: MAX_DELEGATES }
        );
        remove_delegate(&mut record, owner(), other(3), Utc::now(), &mut events).unwrap();
        assert_eq!(
            remove_delegate(&mut record, owner(), other(3), Utc::now(), &mut events).unwrap_err(),
            CairnError::DelegateNotFound
        );
        assert_eq!(record.delegates.len(), MAX_DELEGATES - 1);
    }

    #[test]
    fn configured_delegate_bound_is_respected() {
        let (_dir, mut record, mut events) = setup();
        add_delegate(&mut record, owner(), other(0), 1, Utc::now(), &mut events).unwrap();
        assert_eq!(
            add_delegate(&mut record, owner(), other(1), 1, Utc::now(), &mut events).unwrap_err(),
            CairnError::TooManyDelegates { max: 1 }
        );
    }

    #[test]
    fn delegates_may_edit_profile_but_not_wallet() {
        let (_dir, mut record, mut events) = setup();
        add_delegate(&mut record, owner(), other(1), MAX_DELEGATES, Utc::now(), &mut events).unwrap();
        events.clear();

        let patch = ProfilePatch {
            name: Some("renamed".to_string()),
            category: Some(6),
            ..Default::default()
        };
        let changed = update_profile(&mut record, other(1), patch, Utc::now(), &mut events).unwrap();
        assert_eq!(changed, vec!["name", "category"]);
        assert_eq!(events.len(), 2);

        assert_eq!(
            set_wallet(&mut record, other(1), other(5), Utc::now(), &mut events).unwrap_err(),
            CairnError::NotOwner
        );
        let err = update_profile(&mut record, other(7), ProfilePatch::default(), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::NotAuthorized);
    }

    #[test]
    fn wallet_change_grants_session_rights() {
        let (_dir, mut record, mut events) = setup();
        assert_eq!(
            record_session(&mut record, other(5), Utc::now(), &mut events).unwrap_err(),
            CairnError::NotAuthorized
        );
        set_wallet(&mut record, owner(), other(5), Utc::now(), &mut events).unwrap();
        assert_eq!(record_session(&mut record, other(5), Utc::now(), &mut events).unwrap(), 1);
        assert!(record.last_session_at.is_some());
    }

    #[test]
    fn sessions_require_active_agent() {
        let (mut dir, mut record, mut events) = setup();
        deactivate(&mut record, &mut dir, owner(), Utc::now(), &mut events).unwrap();
        assert_eq!(
            record_session(&mut record, owner(), Utc::now(), &mut events).unwrap_err(),
            CairnError::AgentInactive
        );
        assert_eq!(record.total_sessions, 0);
    }
}
