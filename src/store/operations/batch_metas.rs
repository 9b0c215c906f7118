use crate::funnel::types::FunnelBatchMeta;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Append one immutable batch description to the learner's history.
    pub fn append_batch_meta(
        &self,
        user_id: &str,
        meta: &FunnelBatchMeta,
    ) -> Result<(), StoreError> {
        let key = keys::batch_meta_key(user_id, meta.created_at.timestamp_millis(), &meta.id);
        self.batch_metas
            .insert(key.as_bytes(), Self::serialize(meta)?)?;
        Ok(())
    }

    /// Newest batches first.
    pub fn list_batch_metas(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FunnelBatchMeta>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let prefix = keys::batch_meta_prefix(user_id);
        let mut metas = Vec::with_capacity(limit);
        for item in self.batch_metas.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            metas.push(Self::deserialize(&raw)?);
            if metas.len() >= limit {
                break;
            }
        }
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::funnel::types::SourceCounts;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            Store::open(dir.path().join("batch-metas.sled").to_str().unwrap()).expect("open");
        (dir, store)
    }

    fn meta(id: &str, minutes_ago: i64) -> FunnelBatchMeta {
        FunnelBatchMeta {
            id: id.to_string(),
            focus_targets: Vec::new(),
            explore_targets: Vec::new(),
            target_by_question_id: HashMap::new(),
            source_counts: SourceCounts::default(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn history_lists_newest_first() {
        let (_dir, store) = temp_store();
        store.append_batch_meta("u1", &meta("old", 30)).unwrap();
        store.append_batch_meta("u1", &meta("new", 1)).unwrap();
        store.append_batch_meta("u2", &meta("other", 1)).unwrap();

        let history = store.list_batch_metas("u1", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "new");
        assert_eq!(history[1].id, "old");
    }

    #[test]
    fn limit_bounds_the_scan() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store.append_batch_meta("u1", &meta(&format!("b{i}"), i)).unwrap();
        }
        assert_eq!(store.list_batch_metas("u1", 3).unwrap().len(), 3);
        assert!(store.list_batch_metas("u1", 0).unwrap().is_empty());
    }
}
