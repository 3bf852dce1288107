// crates/cairn-core/src/agent.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CairnError;
use crate::identity::{AgentId, Principal, SessionId};
use crate::tier::Tier;

/// Cred score every agent starts with.
pub const STARTING_CRED: u8 = 70;

/// Upper bound on the delegate set.
pub const MAX_DELEGATES: usize = 10;

/// Maximum agent name length in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Maximum agent URI length in bytes.
pub const MAX_URI_LEN: usize = 256;

/// Maximum number of metadata entries.
pub const MAX_METADATA_ENTRIES: usize = 16;

const URI_SCHEMES: [&str; 3] = ["http://", "https://", "ipfs://"];

/// What kind of service an agent offers. Wire codes are 0..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentCategory {
    General,
    Assistant,
    Trading,
    Research,
    Creative,
    Infrastructure,
    Security,
    Gaming,
}

impl AgentCategory {
    /// Decode a wire code, rejecting anything outside the enumerated range.
    pub fn from_code(code: u8) -> Result<Self, CairnError> {
        match code {
            0 => Ok(AgentCategory::General),
            1 => Ok(AgentCategory::Assistant),
            2 => Ok(AgentCategory::Trading),
            3 => Ok(AgentCategory::Research),
            4 => Ok(AgentCategory::Creative),
            5 => Ok(AgentCategory::Infrastructure),
            6 => Ok(AgentCategory::Security),
            7 => Ok(AgentCategory::Gaming),
            other => Err(CairnError::InvalidInput(format!(
                "category {} out of range 0..=7",
                other
            ))),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Descriptive profile of an agent. Free-form beyond the basic constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub uri: String,
    pub category: AgentCategory,
    pub metadata: BTreeMap<String, String>,
}

/// Unvalidated profile as supplied by a registering owner.
///
/// Metadata arrives as two parallel lists; their lengths must match.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub name: String,
    pub uri: String,
    pub category: u8,
    pub metadata_keys: Vec<String>,
    pub metadata_values: Vec<String>,
}

impl ProfileInput {
    /// Validate every field and build the profile.
    ///
    /// # Errors
    /// Returns `CairnError::InvalidInput` naming the first violated constraint.
    pub fn validate(self) -> Result<AgentProfile, CairnError> {
        validate_name(&self.name)?;
        validate_uri(&self.uri)?;
        let category = AgentCategory::from_code(self.category)?;
        let metadata = build_metadata(self.metadata_keys, self.metadata_values)?;
        Ok(AgentProfile {
            name: self.name,
            uri: self.uri,
            category,
            metadata,
        })
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub category: Option<u8>,
    pub metadata: Option<(Vec<String>, Vec<String>)>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.uri.is_none() && self.category.is_none() && self.metadata.is_none()
    }

    /// Apply the patch to a copy of `current`, returning the new profile and
    /// the names of fields whose value actually changed.
    pub fn apply_to(
        self,
        current: &AgentProfile,
    ) -> Result<(AgentProfile, Vec<&'static str>), CairnError> {
        let mut next = current.clone();
        let mut changed = Vec::new();

        if let Some(name) = self.name {
            validate_name(&name)?;
            if name != next.name {
                next.name = name;
                changed.push("name");
            }
        }
        if let Some(uri) = self.uri {
            validate_uri(&uri)?;
            if uri != next.uri {
                next.uri = uri;
                changed.push("uri");
            }
        }
        if let Some(code) = self.category {
            let category = AgentCategory::from_code(code)?;
            if category != next.category {
                next.category = category;
                changed.push("category");
            }
        }
        if let Some((keys, values)) = self.metadata {
            let metadata = build_metadata(keys, values)?;
            if metadata != next.metadata {
                next.metadata = metadata;
                changed.push("metadata");
            }
        }

        Ok((next, changed))
    }
}

fn validate_name(name: &str) -> Result<(), CairnError> {
    if name.trim().is_empty() {
        return Err(CairnError::InvalidInput("name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CairnError::InvalidInput(format!(
            "name exceeds {} bytes",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_uri(uri: &str) -> Result<(), CairnError> {
    if uri.is_empty() {
        return Err(CairnError::InvalidInput("uri must not be empty".to_string()));
    }
    if uri.len() > MAX_URI_LEN {
        return Err(CairnError::InvalidInput(format!(
            "uri exceeds {} bytes",
            MAX_URI_LEN
        )));
    }
    if !URI_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
        return Err(CairnError::InvalidInput(format!(
            "uri must start with one of {:?}",
            URI_SCHEMES
        )));
    }
    Ok(())
}

fn build_metadata(
    keys: Vec<String>,
    values: Vec<String>,
) -> Result<BTreeMap<String, String>, CairnError> {
    if keys.len() != values.len() {
        return Err(CairnError::InvalidInput(format!(
            "metadata has {} keys but {} values",
            keys.len(),
            values.len()
        )));
    }
    if keys.len() > MAX_METADATA_ENTRIES {
        return Err(CairnError::InvalidInput(format!(
            "metadata exceeds {} entries",
            MAX_METADATA_ENTRIES
        )));
    }
    let mut metadata = BTreeMap::new();
    for (key, value) in keys.into_iter().zip(values) {
        if key.is_empty() {
            return Err(CairnError::InvalidInput("metadata key must not be empty".to_string()));
        }
        if metadata.contains_key(&key) {
            return Err(CairnError::InvalidInput(format!("duplicate metadata key {:?}", key)));
        }
        metadata.insert(key, value);
    }
    Ok(metadata)
}

/// Which principals count as authorized for a caller-defined action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthPolicy {
    OwnerOnly,
    WalletOnly,
    OwnerOrWallet,
    DelegateOnly,
    /// Owner, wallet, or any delegate.
    Any,
}

/// The durable identity and reputation record of one agent.
///
/// Records are never physically deleted; unregistering only deactivates
/// them and unlinks them from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    /// Principal with full control.
    pub owner: Principal,
    /// Payment-receiving principal. Defaults to the owner.
    pub wallet: Principal,
    /// Principals with limited authority. Bounded by `MAX_DELEGATES`.
    pub delegates: Vec<Principal>,
    pub profile: AgentProfile,
    /// Reputation in [0, 100].
    pub cred_score: u8,
    /// Includes neutral feedback, which counts toward neither bucket below.
    pub total_feedback_received: u64,
    pub positive_feedback: u64,
    pub negative_feedback: u64,
    pub total_sessions: u64,
    pub is_active: bool,
    /// submitter -> sessions already reviewed by that submitter.
    pub feedback_sessions: HashMap<Principal, HashSet<SessionId>>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_session_at: Option<DateTime<Utc>>,
    /// Set once the record is unlinked from the directory.
    #[serde(default)]
    pub unregistered_at: Option<DateTime<Utc>>,
}

impl AgentRecord {
    /// Create a fresh, active record at the starting cred.
    pub fn new(
        id: AgentId,
        owner: Principal,
        wallet: Option<Principal>,
        profile: AgentProfile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            wallet: wallet.unwrap_or(owner),
            delegates: Vec::new(),
            profile,
            cred_score: STARTING_CRED,
            total_feedback_received: 0,
            positive_feedback: 0,
            negative_feedback: 0,
            total_sessions: 0,
            is_active: true,
            feedback_sessions: HashMap::new(),
            registered_at: now,
            updated_at: now,
            last_session_at: None,
            unregistered_at: None,
        }
    }

    pub fn tier(&self) -> Tier {
        Tier::from_cred(self.cred_score)
    }

    pub fn is_owner(&self, principal: &Principal) -> bool {
        self.owner == *principal
    }

    pub fn is_delegate(&self, principal: &Principal) -> bool {
        self.delegates.contains(principal)
    }

    /// Fail with `NotOwner` unless `caller` owns this record.
    pub fn require_owner(&self, caller: &Principal) -> Result<(), CairnError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(CairnError::NotOwner)
        }
    }

    pub fn is_registered(&self) -> bool {
        self.unregistered_at.is_none()
    }

    /// Fail with `NotFound` once the record has been unregistered.
    pub fn require_registered(&self) -> Result<(), CairnError> {
        if self.is_registered() {
            Ok(())
        } else {
            Err(CairnError::NotFound(format!("agent {} is unregistered", self.id)))
        }
    }

    /// True iff `principal` is the owner, the wallet, or a delegate.
    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.is_authorized_with(AuthPolicy::Any, principal)
    }

    /// Authorization check under a caller-supplied policy.
    pub fn is_authorized_with(&self, policy: AuthPolicy, principal: &Principal) -> bool {
        let owner = self.owner == *principal;
        let wallet = self.wallet == *principal;
        let delegate = self.is_delegate(principal);
        match policy {
            AuthPolicy::OwnerOnly => owner,
            AuthPolicy::WalletOnly => wallet,
            AuthPolicy::OwnerOrWallet => owner || wallet,
            AuthPolicy::DelegateOnly => delegate,
            AuthPolicy::Any => owner || wallet || delegate,
        }
    }

    /// Whether `submitter` already reviewed `session` on this record.
    pub fn has_reviewed(&self, submitter: &Principal, session: &SessionId) -> bool {
        self.feedback_sessions
            .get(submitter)
            .map_or(false, |sessions| sessions.contains(session))
    }
}
