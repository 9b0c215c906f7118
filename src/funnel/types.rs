use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::funnel::concept::ConceptKey;

/// One concept extracted from a source guide: the raw label plus optional
/// free text handed to the generation tier as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideConcept {
    pub label: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Which pool a delivered question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    Verified,
    Bank,
    Generated,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Bank => "bank",
            Self::Generated => "generated",
        }
    }
}

/// A practice question as the scheduler sees it. Structural validation
/// happens at the generation boundary; bank items are validated on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub concept_tags: Vec<String>,
    pub source: SourceTier,
}

/// Per-concept statistics, one per concept the learner ever attempted.
/// Counters are monotonic; records are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMasteryRecord {
    pub key: ConceptKey,
    pub display_name: String,
    pub attempts: u32,
    pub correct: u32,
}

impl ConceptMasteryRecord {
    pub fn new(key: ConceptKey, display_name: &str) -> Self {
        Self {
            key,
            display_name: display_name.trim().to_string(),
            attempts: 0,
            correct: 0,
        }
    }
}

/// The learner's persisted scheduler state for one guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelState {
    pub user_id: String,
    pub guide_id: String,
    pub concepts: HashMap<ConceptKey, ConceptMasteryRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FunnelState {
    pub fn new(user_id: &str, guide_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            guide_id: guide_id.to_string(),
            concepts: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-tier yield counts for one batch, kept for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCounts {
    pub verified: u32,
    pub bank: u32,
    pub generated: u32,
}

impl SourceCounts {
    pub fn record(&mut self, tier: SourceTier) {
        match tier {
            SourceTier::Verified => self.verified += 1,
            SourceTier::Bank => self.bank += 1,
            SourceTier::Generated => self.generated += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.verified + self.bank + self.generated
    }

    pub fn merge(&mut self, other: &SourceCounts) {
        self.verified += other.verified;
        self.bank += other.bank;
        self.generated += other.generated;
    }
}

/// Immutable description of one completed batch selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelBatchMeta {
    pub id: String,
    pub focus_targets: Vec<ConceptKey>,
    pub explore_targets: Vec<ConceptKey>,
    pub target_by_question_id: HashMap<String, ConceptKey>,
    pub source_counts: SourceCounts,
    pub created_at: DateTime<Utc>,
}

/// One answered question as reported by the surrounding UI layer.
/// `concept_tags` may be empty, in which case the stored question's tags are
/// used as fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub question_id: String,
    #[serde(default)]
    pub concept_tags: Vec<String>,
    pub is_correct: bool,
}

/// Input to a batch selection.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub user_id: String,
    pub guide_id: String,
    pub guide_concepts: Vec<GuideConcept>,
    pub requested: u32,
    /// Seeded explore shuffling for reproducibility; entropy when absent.
    pub seed: Option<u64>,
}

/// The delivered batch plus its metadata and soft warnings (shortfalls,
/// degraded persistence). Never an error once at least target selection ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSelection {
    pub questions: Vec<Question>,
    pub meta: FunnelBatchMeta,
    pub warnings: Vec<String>,
}

/// Mastery record enriched with its derived scores, for the snapshot API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMasterySnapshot {
    pub key: ConceptKey,
    pub display_name: String,
    pub attempts: u32,
    pub correct: u32,
    pub expected_mastery: f64,
    pub priority: f64,
}
