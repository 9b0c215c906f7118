//! Per-concept mastery statistics and their derived scores.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::funnel::concept::normalize;
use crate::funnel::config::MasteryConfig;
use crate::funnel::types::{ConceptMasteryRecord, FunnelState};

/// Smoothed estimate of the probability the learner answers this concept
/// correctly. The pseudo-counts keep the estimate away from 0 and 1 at low
/// sample sizes; zero attempts yields the neutral midpoint.
pub fn expected_mastery(record: &ConceptMasteryRecord, config: &MasteryConfig) -> f64 {
    (record.correct as f64 + config.smoothing_alpha)
        / (record.attempts as f64 + config.smoothing_alpha + config.smoothing_beta)
}

/// Practice urgency: strictly decreasing in expected mastery, plus an
/// uncertainty bonus that shrinks with attempts so under-sampled concepts
/// outrank confidently-weak ones of equal estimated mastery.
pub fn priority(record: &ConceptMasteryRecord, config: &MasteryConfig) -> f64 {
    (1.0 - expected_mastery(record, config))
        + config.uncertainty_weight / (record.attempts as f64 + 1.0)
}

/// Descending priority; equal priorities fall back to lexical key order so
/// ranking is fully deterministic.
pub fn compare_priority(
    a: &ConceptMasteryRecord,
    b: &ConceptMasteryRecord,
    config: &MasteryConfig,
) -> Ordering {
    priority(b, config)
        .partial_cmp(&priority(a, config))
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.key.cmp(&b.key))
}

/// All mastery records ranked most-urgent first.
pub fn rank_by_priority<'a>(
    state: &'a FunnelState,
    config: &MasteryConfig,
) -> Vec<&'a ConceptMasteryRecord> {
    let mut ranked: Vec<&ConceptMasteryRecord> = state.concepts.values().collect();
    ranked.sort_by(|a, b| compare_priority(a, b, config));
    ranked
}

/// Fold one answered question into the state: every attached concept tag
/// gets `attempts += 1` and, on a correct answer, `correct += 1`. Binary
/// correctness only; records are created on first contact and never removed.
pub fn apply_answer(
    state: &mut FunnelState,
    concept_tags: &[String],
    is_correct: bool,
    now: DateTime<Utc>,
) {
    let mut touched = false;

    for raw_tag in concept_tags {
        let key = normalize(raw_tag);
        if key.is_empty() {
            continue;
        }

        let record = state
            .concepts
            .entry(key.clone())
            .or_insert_with(|| ConceptMasteryRecord::new(key, raw_tag));
        record.attempts += 1;
        if is_correct {
            record.correct += 1;
        }
        touched = true;
    }

    if touched {
        state.updated_at = now;
    }
}
