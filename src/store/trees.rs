pub const FUNNEL_STATES: &str = "funnel_states";
pub const QUESTIONS: &str = "questions";
pub const QUESTION_CONCEPT_INDEX: &str = "question_concept_idx";
pub const SEEN_SETS: &str = "seen_sets";
pub const VARIANT_OVERRIDES: &str = "variant_overrides";
pub const BATCH_METAS: &str = "batch_metas";
pub const SCHEMA_META: &str = "schema_meta";
