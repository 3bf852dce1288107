// crates/cairn-consensus/src/validation.rs
//
// Validation request lifecycle.
//
//   request_validation   owner opens a Pending request
//   submit_validation    distinct non-owner validators append scores
//   resolve_validation   owner closes it once the quorum is met:
//                        Pending -> Passed | Failed, exactly once

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cairn_core::crypto::ContentHash;
use cairn_core::directory::Directory;
use cairn_core::events::{CredReason, RegistryEvent};
use cairn_core::validation::{ValidationRequest, ValidationResponse, ValidationStatus};
use cairn_core::{AgentRecord, CairnError, Principal};
use cairn_reputation::apply_cred_change;

use crate::quorum::{Verdict, MIN_VALIDATORS};

/// Highest accepted validator score.
pub const MAX_SCORE: u8 = 100;

/// Tunable resolution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationParams {
    min_validators: usize,
}

impl ValidationParams {
    /// Quorum floors below `MIN_VALIDATORS` are raised to it.
    pub fn new(min_validators: usize) -> Self {
        Self {
            min_validators: min_validators.max(MIN_VALIDATORS),
        }
    }

    pub fn min_validators(&self) -> usize {
        self.min_validators
    }
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self::new(MIN_VALIDATORS)
    }
}

/// Open a validation request for `record`.
///
/// # Errors
/// - `NotOwner` unless `requester` owns the record.
/// - `NotFound` if the record has been unregistered.
/// - `InvalidInput` if `request_uri` is empty.
pub fn request_validation(
    record: &AgentRecord,
    directory: &mut Directory,
    requester: Principal,
    request_uri: String,
    request_hash: ContentHash,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<ValidationRequest, CairnError> {
    record.require_owner(&requester)?;
    record.require_registered()?;
    if request_uri.is_empty() {
        return Err(CairnError::InvalidInput(
            "request_uri must not be empty".to_string(),
        ));
    }

    let request_id = directory.next_request_id();
    events.push(RegistryEvent::ValidationRequested {
        request_id,
        agent_id: record.id,
        requester,
        at: now,
    });
    tracing::info!("Validation {} opened for agent {}", request_id, record.id);

    Ok(ValidationRequest {
        request_id,
        agent_id: record.id,
        agent_owner: record.owner,
        request_uri,
        request_hash,
        responses: Vec::new(),
        status: ValidationStatus::Pending,
        avg_score: None,
        created_at: now,
        resolved_at: None,
    })
}

/// Append one validator's score to a pending request.
///
/// # Errors
/// - `AlreadyResolved` if the request is no longer pending.
/// - `CannotValidateSelf` if the validator owns the agent.
/// - `AlreadyValidated` if the validator already responded.
/// - `InvalidScore` if `score > 100`.
pub fn submit_validation(
    request: &mut ValidationRequest,
    validator: Principal,
    score: u8,
    tag: String,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<(), CairnError> {
    if !request.is_pending() {
        return Err(CairnError::AlreadyResolved);
    }
    if validator == request.agent_owner {
        return Err(CairnError::CannotValidateSelf);
    }
    if request.has_validator(&validator) {
        return Err(CairnError::AlreadyValidated);
    }
    if score > MAX_SCORE {
        return Err(CairnError::InvalidScore(score));
    }

    request.responses.push(ValidationResponse {
        validator,
        score,
        tag,
        submitted_at: now,
    });
    events.push(RegistryEvent::ValidationResponseSubmitted {
        request_id: request.request_id,
        validator,
        score,
        at: now,
    });
    tracing::debug!(
        "Validation {}: response {} from {} (score {})",
        request.request_id,
        request.validator_count(),
        validator.short(),
        score
    );
    Ok(())
}

/// Resolve a pending request against its agent record.
///
/// # Errors
/// - `AlreadyResolved` if the request is no longer pending.
/// - `RequestMismatch` if the request targets a different agent.
/// - `NotOwner` unless `resolver` is the owner the request was opened by.
/// - `InsufficientValidators` below the quorum floor.
pub fn resolve_validation(
    record: &mut AgentRecord,
    request: &mut ValidationRequest,
    directory: &mut Directory,
    resolver: Principal,
    params: ValidationParams,
    now: DateTime<Utc>,
    events: &mut Vec<RegistryEvent>,
) -> Result<Verdict, CairnError> {
    if !request.is_pending() {
        return Err(CairnError::AlreadyResolved);
    }
    if record.id != request.agent_id {
        return Err(CairnError::RequestMismatch);
    }
    if resolver != request.agent_owner {
        return Err(CairnError::NotOwner);
    }
    let verdict = Verdict::from_responses(&request.responses, params.min_validators())?;

    request.status = if verdict.passed {
        ValidationStatus::Passed
    } else {
        ValidationStatus::Failed
    };
    request.avg_score = Some(verdict.avg_score);
    request.resolved_at = Some(now);

    events.push(RegistryEvent::ValidationResolved {
        request_id: request.request_id,
        agent_id: record.id,
        passed: verdict.passed,
        avg_score: verdict.avg_score,
        at: now,
    });

    let reason = if verdict.passed {
        CredReason::ValidationPassed
    } else {
        CredReason::ValidationFailed
    };
    let outcome = apply_cred_change(record, directory, reason, now, events);
    directory.note_validation_resolved();

    tracing::info!(
        "Validation {} resolved for agent {}: {} (avg {} over {} validators, cred {} -> {})",
        request.request_id,
        record.id,
        if verdict.passed { "passed" } else { "failed" },
        verdict.avg_score,
        request.validator_count(),
        outcome.old_cred,
        outcome.new_cred
    );

    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::crypto::digest;
    use cairn_core::{AgentId, ProfileInput, RequestId, Tier};

    fn owner() -> Principal {
        Principal([1u8; 32])
    }

    fn validator(n: u8) -> Principal {
        Principal([50 + n; 32])
    }

    fn make_record(dir: &mut Directory) -> AgentRecord {
        let profile = ProfileInput {
            name: "validated".to_string(),
            uri: "https://validated.example".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let record = AgentRecord::new(AgentId::now_v7(), owner(), None, profile, Utc::now());
        dir.link_new_agent(record.owner, record.id);
        record
    }

    fn open(record: &AgentRecord, dir: &mut Directory) -> ValidationRequest {
        let mut events = Vec::new();
        request_validation(
            record,
            dir,
            owner(),
            "ipfs://request".to_string(),
            digest(b"request body"),
            Utc::now(),
            &mut events,
        )
        .unwrap()
    }

    fn respond_all(request: &mut ValidationRequest, scores: &[u8]) {
        let mut events = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            submit_validation(
                request,
                validator(i as u8),
                score,
                "audit".to_string(),
                Utc::now(),
                &mut events,
            )
            .unwrap();
        }
    }

    #[test]
    fn only_owner_may_request() {
        let mut dir = Directory::new();
        let record = make_record(&mut dir);
        let mut events = Vec::new();
        let err = request_validation(
            &record,
            &mut dir,
            validator(0),
            "ipfs://x".to_string(),
            [0u8; 32],
            Utc::now(),
            &mut events,
        );
        assert_eq!(err.unwrap_err(), CairnError::NotOwner);
        assert!(events.is_empty());
    }

    #[test]
    fn request_ids_are_monotonic() {
        let mut dir = Directory::new();
        let record = make_record(&mut dir);
        let a = open(&record, &mut dir);
        let b = open(&record, &mut dir);
        assert_eq!(a.request_id, RequestId(1));
        assert_eq!(b.request_id, RequestId(2));
        assert!(a.is_pending());
        assert!(a.resolved_at.is_none());
    }

    #[test]
    fn submission_rules() {
        let mut dir = Directory::new();
        let record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        let mut events = Vec::new();

        let err = submit_validation(&mut request, owner(), 90, String::new(), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::CannotValidateSelf);

        let err = submit_validation(&mut request, validator(0), 101, String::new(), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::InvalidScore(101));

        submit_validation(&mut request, validator(0), 90, String::new(), Utc::now(), &mut events).unwrap();
        let err = submit_validation(&mut request, validator(0), 10, String::new(), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::AlreadyValidated);

        assert_eq!(request.validator_count(), 1);
        assert_eq!(request.responses[0].score, 90);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn responses_keep_arrival_order() {
        let mut dir = Directory::new();
        let record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[10, 90, 50]);
        let scores: Vec<u8> = request.responses.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![10, 90, 50]);
        let validators: Vec<Principal> = request.validators().copied().collect();
        assert_eq!(validators, vec![validator(0), validator(1), validator(2)]);
    }

    #[test]
    fn passing_resolution_raises_cred() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[80, 70, 90]);

        let mut events = Vec::new();
        let verdict = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        )
        .unwrap();
        assert_eq!(verdict, Verdict { avg_score: 80, passed: true });
        assert_eq!(request.status, ValidationStatus::Passed);
        assert_eq!(request.avg_score, Some(80));
        assert!(request.resolved_at.is_some());
        assert_eq!(record.cred_score, 72);
        assert_eq!(dir.stats().total_validations, 1);
    }

    #[test]
    fn failing_resolution_penalizes() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[30, 40, 50]);

        let mut events = Vec::new();
        let verdict = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        )
        .unwrap();
        assert_eq!(verdict.avg_score, 40);
        assert!(!verdict.passed);
        assert_eq!(request.status, ValidationStatus::Failed);
        assert_eq!(record.cred_score, 60);
        assert_eq!(record.tier(), Tier::Restricted);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["validation_resolved", "cred_updated", "tier_changed"]);
    }

    #[test]
    fn resolution_guards_leave_state_untouched() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        let mut other = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[90, 90]);
        let mut events = Vec::new();

        let err = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        );
        assert_eq!(
            err.unwrap_err(),
            CairnError::InsufficientValidators { have: 2, need: 3 }
        );

        respond_all_from(&mut request, 2, &[90]);

        let err = resolve_validation(
            &mut other,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        );
        assert_eq!(err.unwrap_err(), CairnError::RequestMismatch);

        let err = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            validator(0),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        );
        assert_eq!(err.unwrap_err(), CairnError::NotOwner);

        assert!(request.is_pending());
        assert_eq!(record.cred_score, 70);
        assert_eq!(dir.stats().total_validations, 0);
        assert!(events.is_empty());
    }

    fn respond_all_from(request: &mut ValidationRequest, offset: u8, scores: &[u8]) {
        let mut events = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            submit_validation(
                request,
                validator(offset + i as u8),
                score,
                String::new(),
                Utc::now(),
                &mut events,
            )
            .unwrap();
        }
    }

    #[test]
    fn resolution_is_one_shot() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[70, 70, 70]);
        let mut events = Vec::new();
        resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        )
        .unwrap();

        let err = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            ValidationParams::default(),
            Utc::now(),
            &mut events,
        );
        assert_eq!(err.unwrap_err(), CairnError::AlreadyResolved);

        let err = submit_validation(&mut request, validator(9), 100, String::new(), Utc::now(), &mut events);
        assert_eq!(err.unwrap_err(), CairnError::AlreadyResolved);
        assert_eq!(record.cred_score, 72);
        assert_eq!(dir.stats().total_validations, 1);
    }

    #[test]
    fn higher_quorum_is_honored_and_floor_is_kept() {
        assert_eq!(ValidationParams::new(1).min_validators(), MIN_VALIDATORS);
        let params = ValidationParams::new(4);

        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        let mut request = open(&record, &mut dir);
        respond_all(&mut request, &[90, 90, 90]);
        let mut events = Vec::new();
        let err = resolve_validation(
            &mut record,
            &mut request,
            &mut dir,
            owner(),
            params,
            Utc::now(),
            &mut events,
        );
        assert_eq!(
            err.unwrap_err(),
            CairnError::InsufficientValidators { have: 3, need: 4 }
        );
    }

    #[test]
    fn unregistered_record_cannot_open_requests() {
        let mut dir = Directory::new();
        let mut record = make_record(&mut dir);
        record.unregistered_at = Some(Utc::now());
        let mut events = Vec::new();
        let err = request_validation(
            &record,
            &mut dir,
            owner(),
            "ipfs://request".to_string(),
            digest(b"request body"),
            Utc::now(),
            &mut events,
        );
        assert!(matches!(err, Err(CairnError::NotFound(_))));
        assert!(events.is_empty());
        assert_eq!(dir.next_request_id(), RequestId(1));
    }
}
