//! On-demand question generation: the external model behind the last source
//! tier. The scheduler treats it as an opaque collaborator that either
//! returns structured candidates or fails retryably.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

#[derive(Debug)]
pub struct GenerationProvider {
    config: GenerationConfig,
    client: reqwest::Client,
    mock_seq: AtomicU64,
}

/// A candidate question as returned by the model, before validation and
/// before it is granted an id or concept tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCandidate {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest<'a> {
    concept: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationResponse {
    items: Vec<GeneratedCandidate>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation is disabled")]
    Disabled,
    #[error("generation request timed out")]
    Timeout,
    #[error("generation network error: {0}")]
    Network(String),
    #[error("generation api error: status={status}, message={message}")]
    Api { status: u16, message: String },
    #[error("generation returned a malformed payload: {0}")]
    Malformed(String),
}

impl GenerationProvider {
    pub fn new(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
            mock_seq: AtomicU64::new(0),
        }
    }

    /// Validate generation configuration at startup.
    /// Panics when `enabled=true` and `mock=false` without an API endpoint,
    /// since the service would fail on every batch otherwise.
    pub fn validate_config(config: &GenerationConfig) {
        if config.enabled && !config.mock && config.api_url.trim().is_empty() {
            panic!(
                "Invalid generation configuration: enabled=true, mock=false and \
                 GENERATION_API_URL is empty. Set the URL or enable GENERATION_MOCK."
            );
        }
    }

    /// Ask the model for `count` candidate questions on one concept.
    /// Failures are retryable by the caller; this method performs no retries
    /// of its own.
    pub async fn generate(
        &self,
        concept: &str,
        detail: Option<&str>,
        count: usize,
    ) -> Result<Vec<GeneratedCandidate>, GenerationError> {
        if !self.config.enabled {
            return Err(GenerationError::Disabled);
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        if self.config.mock {
            return Ok(self.mock_candidates(concept, count));
        }

        let request = GenerationRequest {
            concept,
            detail,
            count,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: GenerationResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        Ok(payload.items)
    }

    /// Mock mode yields structurally valid, content-unique candidates so the
    /// pipeline (and its fingerprint dedup) behaves realistically in tests
    /// and local development.
    fn mock_candidates(&self, concept: &str, count: usize) -> Vec<GeneratedCandidate> {
        (0..count)
            .map(|_| {
                let seq = self.mock_seq.fetch_add(1, Ordering::Relaxed);
                let options: Vec<String> = (0..4)
                    .map(|i| format!("Statement {i} about {concept} (set {seq})"))
                    .collect();
                GeneratedCandidate {
                    text: format!("Which statement about {concept} is accurate? (variant {seq})"),
                    correct_answer: options[(seq % 4) as usize].clone(),
                    options,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, mock: bool) -> GenerationConfig {
        GenerationConfig {
            enabled,
            mock,
            api_url: String::new(),
            api_key: String::new(),
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn disabled_mode_returns_error() {
        let provider = GenerationProvider::new(&config(false, true));
        let result = provider.generate("osmosis", None, 3).await;
        assert!(matches!(result, Err(GenerationError::Disabled)));
    }

    #[tokio::test]
    async fn mock_mode_returns_requested_count() {
        let provider = GenerationProvider::new(&config(true, true));
        let items = provider.generate("osmosis", None, 3).await.unwrap();
        assert_eq!(items.len(), 3);
        for item in &items {
            assert!(item.options.contains(&item.correct_answer));
        }
    }

    #[tokio::test]
    async fn mock_candidates_are_content_unique() {
        let provider = GenerationProvider::new(&config(true, true));
        let first = provider.generate("osmosis", None, 2).await.unwrap();
        let second = provider.generate("osmosis", None, 2).await.unwrap();

        let texts: std::collections::HashSet<String> = first
            .iter()
            .chain(second.iter())
            .map(|c| c.text.clone())
            .collect();
        assert_eq!(texts.len(), 4);
    }

    #[test]
    #[should_panic(expected = "Invalid generation configuration")]
    fn real_mode_without_url_panics_at_validation() {
        GenerationProvider::validate_config(&config(true, false));
    }
}
