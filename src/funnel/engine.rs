//! The orchestrating engine: the only funnel component that touches the
//! store, the generation service or the clock. Everything it calls into is
//! pure and separately tested.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::funnel::concept::{self, ConceptKey};
use crate::funnel::config::FunnelConfig;
use crate::funnel::fingerprint;
use crate::funnel::mastery;
use crate::funnel::sourcing;
use crate::funnel::targets;
use crate::funnel::types::*;
use crate::funnel::variant::{self, VariantArm};
use crate::response::AppError;
use crate::services::generation::GenerationProvider;
use crate::store::Store;

pub struct FunnelEngine {
    config: Arc<RwLock<FunnelConfig>>,
    store: Arc<Store>,
    generation: Arc<GenerationProvider>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Local seen-set cache, keyed by `user:module`. Authoritative between
    /// reconciliations with the store.
    seen_cache: RwLock<HashMap<String, HashSet<String>>>,
}

impl FunnelEngine {
    pub fn new(
        config: FunnelConfig,
        store: Arc<Store>,
        generation: Arc<GenerationProvider>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            generation,
            user_locks: Mutex::new(HashMap::new()),
            seen_cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn reload_config(&self, new_config: FunnelConfig) -> Result<(), String> {
        new_config.validate()?;
        let mut config = self.config.write().await;
        *config = new_config;
        tracing::info!("Funnel config reloaded");
        Ok(())
    }

    pub async fn get_config(&self) -> FunnelConfig {
        self.config.read().await.clone()
    }

    async fn acquire_user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;

        // Periodically prune entries no longer held by anyone.
        // Arc::strong_count == 1 means only the map holds a reference.
        if locks.len() > 1000 {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Select and source one batch. Target selection runs under the user
    /// lock; sourcing (which may call the generation service) does not.
    pub async fn select_batch(&self, request: BatchRequest) -> Result<BatchSelection, AppError> {
        let config = self.config.read().await.clone();

        let (selected, specs) = {
            let user_lock = self.acquire_user_lock(&request.user_id).await;
            let _guard = user_lock.lock().await;

            let state = self
                .store
                .get_or_init_funnel_state(&request.user_id, &request.guide_id)?;

            let universe = concept::build_universe(
                &request.guide_concepts,
                state
                    .concepts
                    .iter()
                    .map(|(key, record)| (key, record.display_name.as_str())),
            );

            let mut rng = match request.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let selected =
                targets::select_targets(&universe, &state, request.requested, &config, &mut rng);

            let detail_by_key: HashMap<ConceptKey, String> = request
                .guide_concepts
                .iter()
                .filter_map(|gc| {
                    gc.detail
                        .as_ref()
                        .map(|detail| (concept::normalize(&gc.label), detail.clone()))
                })
                .collect();

            let specs = sourcing::specs_from_slots(
                selected.slots(),
                |key| {
                    universe
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| key.as_str().to_string())
                },
                |key| detail_by_key.get(key).cloned(),
            );

            (selected, specs)
        };

        if selected.is_empty() {
            tracing::info!(
                user_id = %request.user_id,
                guide_id = %request.guide_id,
                "Empty concept universe, returning empty batch"
            );
            return Ok(self.empty_selection());
        }

        let arm = self
            .effective_variant(&request.user_id, &request.guide_id)
            .await?
            .0;
        let seen = self
            .seen_snapshot(&request.user_id, &request.guide_id)
            .await;

        let outcome = sourcing::source_batch(
            &self.store,
            &self.generation,
            &config.sourcing,
            &request.guide_id,
            &specs,
            arm,
            seen,
        )
        .await;

        let meta = FunnelBatchMeta {
            id: Uuid::new_v4().to_string(),
            focus_targets: selected.focus.clone(),
            explore_targets: selected.explore.clone(),
            target_by_question_id: outcome.target_by_question_id,
            source_counts: outcome.source_counts,
            created_at: Utc::now(),
        };

        let mut warnings: Vec<String> = outcome
            .shortfalls
            .iter()
            .map(|s| {
                format!(
                    "concept '{}': requested {}, delivered {}",
                    s.concept, s.requested, s.delivered
                )
            })
            .collect();

        // Batch history is observability, never a delivery blocker.
        if let Err(error) = self.store.append_batch_meta(&request.user_id, &meta) {
            tracing::warn!(%error, "Failed to persist batch meta");
            warnings.push("batch history could not be persisted".to_string());
        }

        // Delivery is the moment questions count as seen: merge the cache
        // synchronously, reconcile with the store in the background.
        self.mark_seen(&request.user_id, &request.guide_id, &outcome.questions)
            .await;

        tracing::info!(
            user_id = %request.user_id,
            guide_id = %request.guide_id,
            batch_id = %meta.id,
            delivered = outcome.questions.len(),
            verified = meta.source_counts.verified,
            bank = meta.source_counts.bank,
            generated = meta.source_counts.generated,
            arm = arm.as_str(),
            "Batch assembled"
        );

        Ok(BatchSelection {
            questions: outcome.questions,
            meta,
            warnings,
        })
    }

    fn empty_selection(&self) -> BatchSelection {
        BatchSelection {
            questions: Vec::new(),
            meta: FunnelBatchMeta {
                id: Uuid::new_v4().to_string(),
                focus_targets: Vec::new(),
                explore_targets: Vec::new(),
                target_by_question_id: HashMap::new(),
                source_counts: SourceCounts::default(),
                created_at: Utc::now(),
            },
            warnings: vec!["no concepts available for this guide".to_string()],
        }
    }

    /// Fold a list of answered questions into the learner's mastery state.
    /// Events without tags fall back to the stored question's tags.
    pub async fn record_answers(
        &self,
        user_id: &str,
        guide_id: &str,
        answers: &[AnswerEvent],
    ) -> Result<FunnelState, AppError> {
        let user_lock = self.acquire_user_lock(user_id).await;
        let _guard = user_lock.lock().await;

        let mut state = self.store.get_or_init_funnel_state(user_id, guide_id)?;
        let now = Utc::now();

        for event in answers {
            let tags = if event.concept_tags.is_empty() {
                match self.store.get_question(&event.question_id)? {
                    Some(question) => question.concept_tags,
                    None => Vec::new(),
                }
            } else {
                event.concept_tags.clone()
            };

            if tags.is_empty() {
                tracing::warn!(
                    question_id = %event.question_id,
                    "Answer event without resolvable concept tags, skipping"
                );
                continue;
            }

            mastery::apply_answer(&mut state, &tags, event.is_correct, now);
        }

        self.store.set_funnel_state(&state)?;
        Ok(state)
    }

    /// Mastery records with their derived scores, most urgent first.
    pub async fn mastery_snapshot(
        &self,
        user_id: &str,
        guide_id: &str,
    ) -> Result<Vec<ConceptMasterySnapshot>, AppError> {
        let config = self.config.read().await.clone();
        let state = self.store.get_or_init_funnel_state(user_id, guide_id)?;

        let snapshots = mastery::rank_by_priority(&state, &config.mastery)
            .into_iter()
            .map(|record| ConceptMasterySnapshot {
                key: record.key.clone(),
                display_name: record.display_name.clone(),
                attempts: record.attempts,
                correct: record.correct,
                expected_mastery: mastery::expected_mastery(record, &config.mastery),
                priority: mastery::priority(record, &config.mastery),
            })
            .collect();
        Ok(snapshots)
    }

    /// The arm in effect for this (user, guide), and whether it came from an
    /// operator override.
    pub async fn effective_variant(
        &self,
        user_id: &str,
        guide_id: &str,
    ) -> Result<(VariantArm, bool), AppError> {
        // 覆盖读取失败回退到确定性分配，不阻塞批次
        let override_arm = match self.store.get_variant_override(guide_id) {
            Ok(record) => record.map(|r| r.arm),
            Err(error) => {
                tracing::warn!(%error, guide_id, "Variant override lookup failed");
                None
            }
        };
        Ok(variant::effective(override_arm, user_id, guide_id))
    }

    pub async fn seen_count(&self, user_id: &str, module_id: &str) -> usize {
        self.seen_snapshot(user_id, module_id).await.len()
    }

    fn cache_key(user_id: &str, module_id: &str) -> String {
        format!("{user_id}:{module_id}")
    }

    /// Cache-through read of the learner's seen set. Store unavailability
    /// degrades to whatever the cache holds.
    async fn seen_snapshot(&self, user_id: &str, module_id: &str) -> HashSet<String> {
        let key = Self::cache_key(user_id, module_id);

        if let Some(cached) = self.seen_cache.read().await.get(&key) {
            return cached.clone();
        }

        let stored = match self.store.get_seen_set(user_id, module_id) {
            Ok(set) => set.fingerprints,
            Err(error) => {
                tracing::warn!(%error, user_id, module_id, "Seen-set read failed, using empty local set");
                HashSet::new()
            }
        };

        let mut cache = self.seen_cache.write().await;
        cache.entry(key).or_insert_with(|| stored.clone());
        stored
    }

    /// Synchronously merge delivered questions into the cache, then
    /// reconcile the store off the request path. The merge is a union both
    /// ways; nothing is ever removed.
    async fn mark_seen(&self, user_id: &str, module_id: &str, questions: &[Question]) {
        if questions.is_empty() {
            return;
        }

        let mut delivered: HashSet<String> = HashSet::new();
        for question in questions {
            delivered.extend(fingerprint::fingerprints(question));
        }

        let key = Self::cache_key(user_id, module_id);
        {
            let mut cache = self.seen_cache.write().await;
            cache.entry(key).or_default().extend(delivered.iter().cloned());
        }

        let store = self.store.clone();
        let user_id = user_id.to_string();
        let module_id = module_id.to_string();
        tokio::spawn(async move {
            match store.merge_seen_fingerprints(&user_id, &module_id, &delivered) {
                Ok(added) => {
                    tracing::debug!(user_id, module_id, added, "Seen-set reconciled");
                }
                Err(error) => {
                    tracing::warn!(
                        %error,
                        user_id,
                        module_id,
                        "Seen-set reconciliation failed, local cache stays authoritative"
                    );
                }
            }
        });
    }
}
