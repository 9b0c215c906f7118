use crate::funnel::concept::ConceptKey;

pub fn funnel_state_key(user_id: &str, guide_id: &str) -> String {
    format!("{user_id}:{guide_id}")
}

pub fn question_key(question_id: &str) -> String {
    question_id.to_string()
}

pub fn question_concept_index_key(
    guide_id: &str,
    concept: &ConceptKey,
    question_id: &str,
) -> String {
    format!("{guide_id}:{concept}:{question_id}")
}

pub fn question_concept_index_prefix(guide_id: &str, concept: &ConceptKey) -> String {
    format!("{guide_id}:{concept}:")
}

pub fn seen_set_key(user_id: &str, module_id: &str) -> String {
    format!("{user_id}:{module_id}")
}

pub fn variant_override_key(guide_id: &str) -> String {
    guide_id.to_string()
}

/// Reverse-timestamp keys so a prefix scan yields newest batches first.
pub fn batch_meta_key(user_id: &str, timestamp_ms: i64, batch_id: &str) -> String {
    let ts = timestamp_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{user_id}:{reverse_ts:020}:{batch_id}")
}

pub fn batch_meta_prefix(user_id: &str) -> String {
    format!("{user_id}:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::concept::normalize;

    #[test]
    fn batch_meta_key_orders_by_time_desc() {
        let newer = batch_meta_key("u1", 2000, "b2");
        let older = batch_meta_key("u1", 1000, "b1");
        assert!(newer < older);
    }

    #[test]
    fn concept_index_prefix_matches_its_keys() {
        let concept = normalize("Iron Deficiency");
        let key = question_concept_index_key("g1", &concept, "q1");
        let prefix = question_concept_index_prefix("g1", &concept);
        assert!(key.starts_with(&prefix));
    }
}
