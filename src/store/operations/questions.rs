use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::funnel::concept::{normalize, ConceptKey};
use crate::funnel::types::{Question, SourceTier};
use crate::store::keys;
use crate::store::{Store, StoreError};
use crate::validation;

/// A question at rest in the verified/bank pools, indexed by
/// (guide, concept) for tier lookups. Generated questions are served
/// directly from the pipeline and never land here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankQuestion {
    pub id: String,
    pub guide_id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub concept_tags: Vec<String>,
    pub source: SourceTier,
    pub created_at: DateTime<Utc>,
}

impl BankQuestion {
    pub fn to_question(&self) -> Question {
        Question {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
            correct_answer: self.correct_answer.clone(),
            concept_tags: self.concept_tags.clone(),
            source: self.source,
        }
    }

    fn index_keys(&self) -> Vec<String> {
        let mut concept_keys: Vec<ConceptKey> = self
            .concept_tags
            .iter()
            .map(|tag| normalize(tag))
            .filter(|key| !key.is_empty())
            .collect();
        concept_keys.sort_unstable();
        concept_keys.dedup();
        concept_keys
            .iter()
            .map(|key| keys::question_concept_index_key(&self.guide_id, key, &self.id))
            .collect()
    }
}

impl Store {
    /// Insert or replace a bank question, keeping the (guide, concept) index
    /// in step with the tags in the same transaction.
    pub fn upsert_question(&self, question: &BankQuestion) -> Result<(), StoreError> {
        if question.id.trim().is_empty() || question.guide_id.trim().is_empty() {
            return Err(StoreError::Validation(
                "question id and guide id must not be empty".to_string(),
            ));
        }
        if question.source == SourceTier::Generated {
            return Err(StoreError::Validation(
                "generated questions cannot be upserted into the bank".to_string(),
            ));
        }
        validation::validate_candidate(&question.text, &question.options, &question.correct_answer)
            .map_err(|msg| StoreError::Validation(msg.to_string()))?;
        validation::validate_concept_tags(&question.concept_tags)
            .map_err(|msg| StoreError::Validation(msg.to_string()))?;

        let key = keys::question_key(&question.id);
        let value = Self::serialize(question)?;
        let next_index_keys = question.index_keys();

        (&self.questions, &self.question_concept_index)
            .transaction(|(tx_questions, tx_index)| {
                if let Some(old_raw) = tx_questions.get(key.as_bytes())? {
                    let old: BankQuestion = serde_json::from_slice(&old_raw).map_err(|error| {
                        sled::transaction::ConflictableTransactionError::Abort(
                            StoreError::Serialization(error),
                        )
                    })?;
                    for old_index_key in old.index_keys() {
                        tx_index.remove(old_index_key.as_bytes())?;
                    }
                }

                tx_questions.insert(key.as_bytes(), value.as_slice())?;
                for index_key in &next_index_keys {
                    tx_index.insert(index_key.as_bytes(), &[])?;
                }

                Ok(())
            })
            .map_err(
                |error: sled::transaction::TransactionError<StoreError>| match error {
                    sled::transaction::TransactionError::Abort(store_error) => store_error,
                    sled::transaction::TransactionError::Storage(storage_error) => {
                        StoreError::Sled(storage_error)
                    }
                },
            )?;

        Ok(())
    }

    pub fn get_question(&self, question_id: &str) -> Result<Option<BankQuestion>, StoreError> {
        let key = keys::question_key(question_id);
        match self.questions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// All pool questions for a (guide, concept, tier), sorted by id so the
    /// pipeline draws in a stable order.
    pub fn questions_for_concept(
        &self,
        guide_id: &str,
        concept: &ConceptKey,
        tier: SourceTier,
    ) -> Result<Vec<BankQuestion>, StoreError> {
        let prefix = keys::question_concept_index_prefix(guide_id, concept);
        let mut found = Vec::new();

        for item in self.question_concept_index.scan_prefix(prefix.as_bytes()) {
            let (index_key, _) = item?;
            let index_key = String::from_utf8_lossy(&index_key);
            let Some(question_id) = index_key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            // index entries without a backing question are stale leftovers
            let Some(question) = self.get_question(question_id)? else {
                tracing::warn!(question_id, "Dangling question index entry");
                continue;
            };
            if question.source == tier {
                found.push(question);
            }
        }

        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    pub fn list_questions(
        &self,
        guide_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<BankQuestion>, u64), StoreError> {
        let mut matching: Vec<BankQuestion> = Vec::new();
        for item in self.questions.iter() {
            let (_, raw) = item?;
            let question: BankQuestion = Self::deserialize(&raw)?;
            if question.guide_id == guide_id {
                matching.push(question);
            }
        }
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let total = matching.len() as u64;
        let page: Vec<BankQuestion> = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    pub fn count_questions(&self, guide_id: &str) -> Result<u64, StoreError> {
        let mut count = 0u64;
        for item in self.questions.iter() {
            let (_, raw) = item?;
            let question: BankQuestion = Self::deserialize(&raw)?;
            if question.guide_id == guide_id {
                count += 1;
            }
        }
        Ok(count)
    }
}
