//! Content fingerprints and the per-(learner, module) seen set.
//!
//! Dedup policy is strictly false-negative: two renderings of the same item
//! must always collide, while semantically-equivalent but textually distinct
//! items are allowed to slip through. Every variant therefore hashes only
//! canonicalized content, and variants whose canonical payload is empty are
//! skipped so unrelated degenerate questions can never share a print.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::funnel::types::Question;

/// Tokens shorter than this are treated as filler when building the lenient
/// token-bag variant. Tokens carrying digits are always kept: "type 1" and
/// "type 2" name different things no matter how short the number is.
const BAG_MIN_TOKEN_LEN: usize = 3;

fn digest(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Lower-case, drop everything but letters/digits, collapse whitespace.
fn canon(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        } else if ch.is_whitespace() {
            pending_space = !out.is_empty();
        }
    }
    out
}

/// Order-insensitive bag of significant tokens, deduplicated and sorted.
fn token_bag(canonical: &str) -> String {
    let mut tokens: Vec<&str> = canonical
        .split(' ')
        .filter(|t| {
            t.chars().count() >= BAG_MIN_TOKEN_LEN || t.chars().any(|c| c.is_ascii_digit())
        })
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.join(" ")
}

/// All fingerprint variants of a question, strict first.
///
/// - strict: canonical text + sorted canonical options + canonical answer
/// - lenient text: canonical text alone (catches answer-set shuffles)
/// - lenient bag: sorted significant tokens (catches reorderings and small
///   filler-word edits)
pub fn fingerprints(question: &Question) -> Vec<String> {
    let text = canon(&question.text);

    let mut options: Vec<String> = question.options.iter().map(|o| canon(o)).collect();
    options.sort_unstable();
    let answer = canon(&question.correct_answer);

    let mut prints = Vec::with_capacity(3);
    prints.push(digest(&format!(
        "qa|{text}|{options}|{answer}",
        options = options.join(";")
    )));

    if !text.is_empty() {
        prints.push(digest(&format!("t|{text}")));
        let bag = token_bag(&text);
        if !bag.is_empty() && bag != text {
            prints.push(digest(&format!("b|{bag}")));
        }
    }

    prints
}

/// The strict variant, used as the question's stable content identity.
pub fn primary_fingerprint(question: &Question) -> String {
    fingerprints(question)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// True when any variant of the question is already in the set.
pub fn has_seen(question: &Question, seen: &HashSet<String>) -> bool {
    fingerprints(question).iter().any(|fp| seen.contains(fp))
}

/// Per-(learner, module) set of every fingerprint observed across all
/// historical sessions. Grows monotonically; merges are unions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenSet {
    pub fingerprints: HashSet<String>,
}

impl SeenSet {
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Union the other set in; returns how many entries were actually new,
    /// so callers can skip writes when a merge was a no-op.
    pub fn merge(&mut self, other: &HashSet<String>) -> usize {
        let before = self.fingerprints.len();
        self.fingerprints.extend(other.iter().cloned());
        self.fingerprints.len() - before
    }

    /// Record every variant of the given questions.
    pub fn insert_questions<'a, I>(&mut self, questions: I) -> usize
    where
        I: IntoIterator<Item = &'a Question>,
    {
        let mut incoming = HashSet::new();
        for question in questions {
            incoming.extend(fingerprints(question));
        }
        self.merge(&incoming)
    }
}
