use crate::funnel::types::FunnelState;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn get_funnel_state(
        &self,
        user_id: &str,
        guide_id: &str,
    ) -> Result<Option<FunnelState>, StoreError> {
        let key = keys::funnel_state_key(user_id, guide_id);
        match self.funnel_states.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_or_init_funnel_state(
        &self,
        user_id: &str,
        guide_id: &str,
    ) -> Result<FunnelState, StoreError> {
        Ok(self
            .get_funnel_state(user_id, guide_id)?
            .unwrap_or_else(|| FunnelState::new(user_id, guide_id)))
    }

    pub fn set_funnel_state(&self, state: &FunnelState) -> Result<(), StoreError> {
        for record in state.concepts.values() {
            if record.correct > record.attempts {
                return Err(StoreError::Validation(format!(
                    "mastery record {} has correct > attempts",
                    record.key
                )));
            }
        }

        let key = keys::funnel_state_key(&state.user_id, &state.guide_id);
        let value = Self::serialize(state)?;
        self.funnel_states.insert(key.as_bytes(), value)?;
        Ok(())
    }
}
