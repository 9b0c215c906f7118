use std::collections::HashSet;

use crate::constants::MAX_CAS_RETRIES;
use crate::funnel::fingerprint::SeenSet;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// The durable authoritative copy of a learner's seen set for one
    /// module. Missing entries read as empty.
    pub fn get_seen_set(&self, user_id: &str, module_id: &str) -> Result<SeenSet, StoreError> {
        let key = keys::seen_set_key(user_id, module_id);
        match self.seen_sets.get(key.as_bytes())? {
            Some(raw) => Ok(Self::deserialize(&raw)?),
            None => Ok(SeenSet::default()),
        }
    }

    /// Union new fingerprints into the stored set. Read-union-write under a
    /// bounded CAS loop so concurrent reconciliations from different
    /// sessions never drop each other's entries; returns the number of
    /// fingerprints that were actually new.
    pub fn merge_seen_fingerprints(
        &self,
        user_id: &str,
        module_id: &str,
        fingerprints: &HashSet<String>,
    ) -> Result<usize, StoreError> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let key = keys::seen_set_key(user_id, module_id);

        for _ in 0..MAX_CAS_RETRIES {
            let current_raw = self.seen_sets.get(key.as_bytes())?;
            let mut merged: SeenSet = match &current_raw {
                Some(raw) => Self::deserialize(raw)?,
                None => SeenSet::default(),
            };

            let added = merged.merge(fingerprints);
            if added == 0 {
                return Ok(0);
            }

            let next_raw = Self::serialize(&merged)?;
            let swap = self.seen_sets.compare_and_swap(
                key.as_bytes(),
                current_raw.as_ref(),
                Some(next_raw),
            )?;
            if swap.is_ok() {
                return Ok(added);
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: "seen_set".to_string(),
            key,
            attempts: MAX_CAS_RETRIES,
        })
    }

    pub fn seen_set_len(&self, user_id: &str, module_id: &str) -> Result<usize, StoreError> {
        Ok(self.get_seen_set(user_id, module_id)?.len())
    }
}
