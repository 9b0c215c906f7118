//! Focus/explore target selection for one batch.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::funnel::concept::{ConceptKey, ConceptUniverse};
use crate::funnel::config::FunnelConfig;
use crate::funnel::mastery;
use crate::funnel::types::FunnelState;

/// Targets for one batch. `focus` is distinct by construction; `explore`
/// may repeat keys when the universe is smaller than the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTargets {
    pub focus: Vec<ConceptKey>,
    pub explore: Vec<ConceptKey>,
}

impl SelectedTargets {
    pub fn total(&self) -> usize {
        self.focus.len() + self.explore.len()
    }

    pub fn is_empty(&self) -> bool {
        self.focus.is_empty() && self.explore.is_empty()
    }

    /// Batch slots in serving order: focus first, then explore.
    pub fn slots(&self) -> impl Iterator<Item = &ConceptKey> {
        self.focus.iter().chain(self.explore.iter())
    }
}

/// Clamp a caller-requested batch size into the configured window.
pub fn clamp_total(requested: u32, config: &FunnelConfig) -> usize {
    requested.clamp(config.targets.batch_min, config.targets.batch_max) as usize
}

/// Pick focus (weak, high-priority, distinct) and explore (novel or
/// under-sampled) targets summing to at most the clamped total.
///
/// 选择顺序：先按 priority 排名取 focus 配额，再用未测过的概念填充
/// explore；探索池耗尽时 focus 向排名下方扩展，宇宙太小时 explore 槽位
/// 允许重复。
pub fn select_targets<R: Rng + ?Sized>(
    universe: &ConceptUniverse,
    state: &FunnelState,
    requested: u32,
    config: &FunnelConfig,
    rng: &mut R,
) -> SelectedTargets {
    let total = clamp_total(requested, config);

    // build_universe merges every mastery key into the universe, so an
    // empty universe means there is nothing selectable at all.
    if universe.is_empty() {
        return SelectedTargets {
            focus: Vec::new(),
            explore: Vec::new(),
        };
    }

    let ranked = mastery::rank_by_priority(state, &config.mastery);

    let focus_quota = ((total as f64) * config.targets.focus_ratio).round() as usize;
    let focus_quota = focus_quota.min(ranked.len()).min(total);

    let mut focus: Vec<ConceptKey> = ranked
        .iter()
        .take(focus_quota)
        .map(|record| record.key.clone())
        .collect();

    // Explore pool: universe keys without a record first (never seen), then
    // keys whose record is still under the attempt ceiling. Both groups are
    // shuffled so equally-novel concepts rotate between sessions.
    let mut fresh: Vec<ConceptKey> = Vec::new();
    let mut low_attempt: Vec<ConceptKey> = Vec::new();
    for key in universe.keys() {
        if focus.contains(key) {
            continue;
        }
        match state.concepts.get(key) {
            None => fresh.push(key.clone()),
            Some(record) if record.attempts <= config.targets.explore_attempt_ceiling => {
                low_attempt.push(key.clone())
            }
            Some(_) => {}
        }
    }
    fresh.shuffle(rng);
    low_attempt.shuffle(rng);

    let mut explore: Vec<ConceptKey> = Vec::new();
    let mut pool = fresh.into_iter().chain(low_attempt);
    while focus.len() + explore.len() < total {
        match pool.next() {
            Some(key) => explore.push(key),
            None => break,
        }
    }

    // Explore ran dry: extend the focus slice further down the ranking.
    if focus.len() + explore.len() < total {
        for record in ranked.iter().skip(focus.len()) {
            if focus.len() + explore.len() >= total {
                break;
            }
            if !focus.contains(&record.key) {
                focus.push(record.key.clone());
            }
        }
    }

    // Universe smaller than the batch: explore slots may repeat.
    if focus.len() + explore.len() < total && !universe.is_empty() {
        let mut wrap: Vec<ConceptKey> = universe.keys().cloned().collect();
        wrap.shuffle(rng);
        let mut cursor = 0usize;
        while focus.len() + explore.len() < total {
            explore.push(wrap[cursor % wrap.len()].clone());
            cursor += 1;
        }
    }

    SelectedTargets { focus, explore }
}
