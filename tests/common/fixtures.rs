use chrono::Utc;

use practice_backend::funnel::types::SourceTier;
use practice_backend::store::operations::questions::BankQuestion;
use practice_backend::store::Store;

#[allow(dead_code)]
pub fn seed_questions(
    store: &Store,
    guide_id: &str,
    concept: &str,
    tier: SourceTier,
    count: usize,
) -> Vec<BankQuestion> {
    let mut out = Vec::new();
    for idx in 0..count {
        let question = BankQuestion {
            id: format!("{}-{}-{idx}", tier.as_str(), concept.replace(' ', "-")),
            guide_id: guide_id.to_string(),
            text: format!("Seeded {tier} question {idx} about {concept}?", tier = tier.as_str()),
            options: vec![
                "option one".to_string(),
                "option two".to_string(),
                "option three".to_string(),
            ],
            correct_answer: "option one".to_string(),
            concept_tags: vec![concept.to_string()],
            source: tier,
            created_at: Utc::now(),
        };
        store.upsert_question(&question).expect("upsert seed question");
        out.push(question);
    }
    out
}

#[allow(dead_code)]
pub fn guide_concepts_json(labels: &[&str]) -> serde_json::Value {
    serde_json::Value::Array(
        labels
            .iter()
            .map(|label| serde_json::json!({ "label": label }))
            .collect(),
    )
}
