// crates/cairn-core/src/tier.rs
//
// Visibility tiers derived from cred score.
//
//   [90, 100] Pristine
//   [70,  89] Standard
//   [50,  69] Restricted
//   [30,  49] Probation
//   [ 0,  29] Suspended

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the Pristine tier.
pub const PRISTINE_MIN: u8 = 90;
/// Lower bound (inclusive) of the Standard tier.
pub const STANDARD_MIN: u8 = 70;
/// Lower bound (inclusive) of the Restricted tier.
pub const RESTRICTED_MIN: u8 = 50;
/// Lower bound (inclusive) of the Probation tier.
pub const PROBATION_MIN: u8 = 30;

/// Discrete trust bucket. Ordered from lowest to highest trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Suspended,
    Probation,
    Restricted,
    Standard,
    Pristine,
}

impl Tier {
    /// Derive the tier for a cred score. Scores above 100 map to Pristine.
    pub fn from_cred(cred: u8) -> Self {
        if cred >= PRISTINE_MIN {
            Tier::Pristine
        } else if cred >= STANDARD_MIN {
            Tier::Standard
        } else if cred >= RESTRICTED_MIN {
            Tier::Restricted
        } else if cred >= PROBATION_MIN {
            Tier::Probation
        } else {
            Tier::Suspended
        }
    }

    pub fn is_suspended(self) -> bool {
        self == Tier::Suspended
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Pristine => write!(f, "Pristine"),
            Tier::Standard => write!(f, "Standard"),
            Tier::Restricted => write!(f, "Restricted"),
            Tier::Probation => write!(f, "Probation"),
            Tier::Suspended => write!(f, "Suspended"),
        }
    }
}
