use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::funnel::variant::VariantArm;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// Operator-pinned tier ordering for one guide; beats the deterministic
/// bucket for every learner on that guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOverride {
    pub guide_id: String,
    pub arm: VariantArm,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn get_variant_override(
        &self,
        guide_id: &str,
    ) -> Result<Option<VariantOverride>, StoreError> {
        let key = keys::variant_override_key(guide_id);
        match self.variant_overrides.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_variant_override(&self, guide_id: &str, arm: VariantArm) -> Result<(), StoreError> {
        if guide_id.trim().is_empty() {
            return Err(StoreError::Validation(
                "guide id must not be empty".to_string(),
            ));
        }
        let record = VariantOverride {
            guide_id: guide_id.to_string(),
            arm,
            updated_at: Utc::now(),
        };
        let key = keys::variant_override_key(guide_id);
        self.variant_overrides
            .insert(key.as_bytes(), Self::serialize(&record)?)?;
        Ok(())
    }

    pub fn clear_variant_override(&self, guide_id: &str) -> Result<bool, StoreError> {
        let key = keys::variant_override_key(guide_id);
        Ok(self.variant_overrides.remove(key.as_bytes())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("overrides.sled").to_str().unwrap()).expect("open");
        (dir, store)
    }

    #[test]
    fn set_get_clear_roundtrip() {
        let (_dir, store) = temp_store();
        assert!(store.get_variant_override("g1").unwrap().is_none());

        store
            .set_variant_override("g1", VariantArm::BankFirst)
            .unwrap();
        let stored = store.get_variant_override("g1").unwrap().unwrap();
        assert_eq!(stored.arm, VariantArm::BankFirst);

        assert!(store.clear_variant_override("g1").unwrap());
        assert!(!store.clear_variant_override("g1").unwrap());
        assert!(store.get_variant_override("g1").unwrap().is_none());
    }
}
