//! Concept key canonicalization and per-guide concept universe assembly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::funnel::types::GuideConcept;

/// Canonical form of a free-text concept label, used as the join key between
/// guide content, question tags and mastery records.
///
/// Only `normalize` produces new keys; deserialized keys are trusted to have
/// been normalized before they were persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptKey(String);

impl ConceptKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ephemeral per-guide mapping from canonical key to display name.
/// Recomputed on every request, never persisted.
pub type ConceptUniverse = BTreeMap<ConceptKey, String>;

/// Canonicalize a raw concept label: lower-case, trim, collapse internal
/// whitespace, keep only letters, digits, spaces and hyphens.
///
/// Total and idempotent: unrecognized characters are dropped, never rejected,
/// and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(label: &str) -> ConceptKey {
    let lowered = label.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else if ch.is_alphanumeric() || ch == '-' {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
        // anything else is dropped without leaving a gap
    }

    ConceptKey(out)
}

/// Build the trackable concept universe for one guide.
///
/// Guide-derived labels are normalized and inserted with their first-seen
/// display form (input order decides which form wins). Keys the learner has
/// already been tested on are appended afterwards so long-tail concepts stay
/// selectable even when the guide no longer emphasizes them.
pub fn build_universe<'a, I>(guide_concepts: &[GuideConcept], existing: I) -> ConceptUniverse
where
    I: IntoIterator<Item = (&'a ConceptKey, &'a str)>,
{
    let mut universe = ConceptUniverse::new();

    for concept in guide_concepts {
        let key = normalize(&concept.label);
        if key.is_empty() {
            continue;
        }
        universe
            .entry(key)
            .or_insert_with(|| concept.label.trim().to_string());
    }

    for (key, display_name) in existing {
        if key.is_empty() {
            continue;
        }
        universe
            .entry(key.clone())
            .or_insert_with(|| display_name.to_string());
    }

    universe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guide(labels: &[&str]) -> Vec<GuideConcept> {
        labels
            .iter()
            .map(|l| GuideConcept {
                label: l.to_string(),
                detail: None,
            })
            .collect()
    }

    #[test]
    fn case_punctuation_whitespace_variants_collide() {
        assert_eq!(
            normalize("Iron-Deficiency   Anemia!"),
            normalize("iron-deficiency anemia")
        );
        assert_eq!(normalize("Krebs Cycle."), normalize("  krebs\tCYCLE "));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["  Beta-Oxidation (lipids) ", "ATP synthase?", "贝叶斯定理", ""] {
            let once = normalize(raw);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn punctuation_is_dropped_without_gap() {
        assert_eq!(normalize("don't").as_str(), "dont");
        assert_eq!(normalize("a/b testing").as_str(), "ab testing");
    }

    #[test]
    fn hyphens_survive() {
        assert_eq!(normalize("X-Linked").as_str(), "x-linked");
    }

    #[test]
    fn first_display_name_wins_by_input_order() {
        let universe = build_universe(&guide(&["Krebs Cycle", "KREBS  cycle!"]), []);
        assert_eq!(universe.len(), 1);
        assert_eq!(
            universe.get(&normalize("krebs cycle")).map(String::as_str),
            Some("Krebs Cycle")
        );
    }

    #[test]
    fn mastery_keys_are_appended_without_overriding_guide_names() {
        let tail_key = normalize("ancient history");
        let overlap_key = normalize("krebs cycle");

        let existing = vec![
            (tail_key.clone(), "Ancient History".to_string()),
            (overlap_key.clone(), "krebs cycle (old name)".to_string()),
        ];
        let universe = build_universe(
            &guide(&["Krebs Cycle"]),
            existing.iter().map(|(k, v)| (k, v.as_str())),
        );

        assert_eq!(universe.len(), 2);
        assert_eq!(universe.get(&overlap_key).map(String::as_str), Some("Krebs Cycle"));
        assert_eq!(universe.get(&tail_key).map(String::as_str), Some("Ancient History"));
    }

    #[test]
    fn empty_labels_produce_no_entries() {
        let universe = build_universe(&guide(&["", "   ", "!!!"]), []);
        assert!(universe.is_empty());
    }
}
