//! Tiered batch sourcing: verified bank → precomputed bank → on-demand
//! generation, with batch-wide fingerprint dedup and bounded retries.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::funnel::concept::ConceptKey;
use crate::funnel::config::SourcingConfig;
use crate::funnel::fingerprint;
use crate::funnel::types::{Question, SourceCounts, SourceTier};
use crate::funnel::variant::{self, VariantArm};
use crate::services::generation::{GenerationError, GenerationProvider};
use crate::store::Store;
use crate::validation;

/// One concept's share of a batch. Duplicate explore targets are folded
/// into a single spec with `count > 1` before sourcing starts.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub key: ConceptKey,
    pub display_name: String,
    pub detail: Option<String>,
    pub count: usize,
    /// Index of the concept's first batch slot; decides tier order under
    /// the split arm.
    pub first_slot: usize,
}

/// A target that could not be filled to its requested count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetShortfall {
    pub concept: ConceptKey,
    pub requested: usize,
    pub delivered: usize,
}

#[derive(Debug, Default)]
pub struct SourcingOutcome {
    /// Delivered questions in target order.
    pub questions: Vec<Question>,
    pub target_by_question_id: HashMap<String, ConceptKey>,
    pub source_counts: SourceCounts,
    pub shortfalls: Vec<TargetShortfall>,
}

struct TargetFill {
    key: ConceptKey,
    requested: usize,
    questions: Vec<Question>,
    counts: SourceCounts,
}

/// Atomically accept a candidate: under one lock, reject if any fingerprint
/// variant is already present, otherwise claim all variants. The working set
/// is seeded with the seen snapshot, so one membership check covers both
/// batch-internal and historical duplicates.
async fn try_accept(working: &Mutex<HashSet<String>>, question: &Question) -> bool {
    let prints = fingerprint::fingerprints(question);
    let mut guard = working.lock().await;
    if prints.iter().any(|fp| guard.contains(fp)) {
        return false;
    }
    guard.extend(prints);
    true
}

/// Fill one target from the ordered tiers, stopping early once `count`
/// questions were accepted. Tier exhaustion falls through; only the
/// generation tier retries, up to the configured bound.
async fn fill_target(
    store: &Store,
    generation: &GenerationProvider,
    config: &SourcingConfig,
    guide_id: &str,
    spec: &TargetSpec,
    arm: VariantArm,
    working: &Mutex<HashSet<String>>,
) -> TargetFill {
    let mut fill = TargetFill {
        key: spec.key.clone(),
        requested: spec.count,
        questions: Vec::with_capacity(spec.count),
        counts: SourceCounts::default(),
    };

    for tier in variant::tier_order(arm, spec.first_slot) {
        if fill.questions.len() >= spec.count {
            break;
        }
        match tier {
            SourceTier::Verified | SourceTier::Bank => {
                draw_from_pool(store, guide_id, spec, tier, working, &mut fill).await;
            }
            SourceTier::Generated => {
                draw_from_generation(generation, config, spec, working, &mut fill).await;
            }
        }
    }

    if fill.questions.len() < spec.count {
        tracing::warn!(
            concept = %spec.key,
            requested = spec.count,
            delivered = fill.questions.len(),
            "Target could not be filled from any tier"
        );
    }

    fill
}

async fn draw_from_pool(
    store: &Store,
    guide_id: &str,
    spec: &TargetSpec,
    tier: SourceTier,
    working: &Mutex<HashSet<String>>,
    fill: &mut TargetFill,
) {
    // 池不可用时按空池处理，继续向下一层回退，不阻塞批次交付
    let pool = match store.questions_for_concept(guide_id, &spec.key, tier) {
        Ok(pool) => pool,
        Err(error) => {
            tracing::warn!(concept = %spec.key, tier = tier.as_str(), %error, "Pool lookup failed, skipping tier");
            return;
        }
    };

    for bank_question in pool {
        if fill.questions.len() >= spec.count {
            return;
        }
        let question = bank_question.to_question();
        if try_accept(working, &question).await {
            fill.counts.record(tier);
            fill.questions.push(question);
        }
    }
}

async fn draw_from_generation(
    generation: &GenerationProvider,
    config: &SourcingConfig,
    spec: &TargetSpec,
    working: &Mutex<HashSet<String>>,
    fill: &mut TargetFill,
) {
    let mut attempts = 0;

    while fill.questions.len() < spec.count && attempts < config.generation_max_attempts {
        attempts += 1;
        let missing = spec.count - fill.questions.len();

        let candidates = match generation
            .generate(&spec.display_name, spec.detail.as_deref(), missing)
            .await
        {
            Ok(candidates) => candidates,
            Err(GenerationError::Disabled) => return,
            Err(error) => {
                tracing::warn!(
                    concept = %spec.key,
                    attempt = attempts,
                    %error,
                    "Generation call failed"
                );
                continue;
            }
        };

        for candidate in candidates {
            if fill.questions.len() >= spec.count {
                break;
            }
            if let Err(reason) = validation::validate_candidate(
                &candidate.text,
                &candidate.options,
                &candidate.correct_answer,
            ) {
                tracing::warn!(concept = %spec.key, reason, "Discarding malformed candidate");
                continue;
            }

            let question = Question {
                id: Uuid::new_v4().to_string(),
                text: candidate.text,
                options: candidate.options,
                correct_answer: candidate.correct_answer,
                concept_tags: vec![spec.display_name.clone()],
                source: SourceTier::Generated,
            };
            if try_accept(working, &question).await {
                fill.counts.record(SourceTier::Generated);
                fill.questions.push(question);
            }
        }
    }
}

/// Source a whole batch. Targets run concurrently; the shared working set
/// keeps their accepted fingerprints mutually exclusive. `seen` is the
/// learner's seen-set snapshot at call time.
pub async fn source_batch(
    store: &Store,
    generation: &GenerationProvider,
    config: &SourcingConfig,
    guide_id: &str,
    targets: &[TargetSpec],
    arm: VariantArm,
    seen: HashSet<String>,
) -> SourcingOutcome {
    let working = Mutex::new(seen);

    let fills = join_all(targets.iter().map(|spec| {
        fill_target(store, generation, config, guide_id, spec, arm, &working)
    }))
    .await;

    let mut outcome = SourcingOutcome::default();
    for fill in fills {
        if fill.questions.len() < fill.requested {
            outcome.shortfalls.push(TargetShortfall {
                concept: fill.key.clone(),
                requested: fill.requested,
                delivered: fill.questions.len(),
            });
        }
        outcome.source_counts.merge(&fill.counts);
        for question in fill.questions {
            outcome
                .target_by_question_id
                .insert(question.id.clone(), fill.key.clone());
            outcome.questions.push(question);
        }
    }

    outcome
}

/// Fold an ordered slot list (focus first, then explore; explore may repeat
/// concepts) into one spec per concept, preserving first-slot order.
pub fn specs_from_slots<'a, I>(
    slots: I,
    display_name: impl Fn(&ConceptKey) -> String,
    detail: impl Fn(&ConceptKey) -> Option<String>,
) -> Vec<TargetSpec>
where
    I: IntoIterator<Item = &'a ConceptKey>,
{
    let mut specs: Vec<TargetSpec> = Vec::new();
    let mut by_key: HashMap<ConceptKey, usize> = HashMap::new();

    for (slot, key) in slots.into_iter().enumerate() {
        match by_key.get(key) {
            Some(&position) => specs[position].count += 1,
            None => {
                by_key.insert(key.clone(), specs.len());
                specs.push(TargetSpec {
                    key: key.clone(),
                    display_name: display_name(key),
                    detail: detail(key),
                    count: 1,
                    first_slot: slot,
                });
            }
        }
    }

    specs
}
