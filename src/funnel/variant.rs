//! Stable per-(learner, guide) experiment-arm assignment controlling which
//! source tier a batch slot tries first.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::funnel::types::SourceTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariantArm {
    VerifiedFirst,
    BankFirst,
    /// Alternate between the two orderings by slot parity.
    Split,
}

impl VariantArm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifiedFirst => "verifiedFirst",
            Self::BankFirst => "bankFirst",
            Self::Split => "split",
        }
    }
}

/// Deterministic bucket for a (user, guide) pair. No identity beyond the
/// opaque id pair enters the hash, and repeated calls always agree.
pub fn assign(user_id: &str, guide_id: &str) -> VariantArm {
    let hash = Sha256::digest(format!("{user_id}:{guide_id}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    match u64::from_be_bytes(prefix) % 3 {
        0 => VariantArm::VerifiedFirst,
        1 => VariantArm::BankFirst,
        _ => VariantArm::Split,
    }
}

/// Operator override wins; otherwise the deterministic assignment.
/// The boolean reports whether an override was applied.
pub fn effective(
    override_arm: Option<VariantArm>,
    user_id: &str,
    guide_id: &str,
) -> (VariantArm, bool) {
    match override_arm {
        Some(arm) => (arm, true),
        None => (assign(user_id, guide_id), false),
    }
}

/// Tier order for one batch slot. Generation is always the last resort.
pub fn tier_order(arm: VariantArm, slot_index: usize) -> [SourceTier; 3] {
    const VERIFIED_FIRST: [SourceTier; 3] =
        [SourceTier::Verified, SourceTier::Bank, SourceTier::Generated];
    const BANK_FIRST: [SourceTier; 3] =
        [SourceTier::Bank, SourceTier::Verified, SourceTier::Generated];

    match arm {
        VariantArm::VerifiedFirst => VERIFIED_FIRST,
        VariantArm::BankFirst => BANK_FIRST,
        VariantArm::Split => {
            if slot_index % 2 == 0 {
                VERIFIED_FIRST
            } else {
                BANK_FIRST
            }
        }
    }
}
