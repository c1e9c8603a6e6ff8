//! HTTP embedding client.
//!
//! Talks to an OpenAI-compatible `/v1/embeddings` endpoint. Failures are
//! classified into context-size overflow (handled upstream by recursive
//! batch halving) and everything else.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use vaultqa_core::{Result, VaultQaError};
use vaultqa_vector::EmbeddingGenerator;

/// Markers a server uses to signal that the input exceeded the model's
/// context window.
const OVERFLOW_MARKERS: &[&str] = &[
    "exceed_context_size",
    "context_length_exceeded",
    "maximum context length",
    "too many tokens",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingClientConfig {
    pub url: String,
    pub model: String,
    /// Declared dimensionality; verified against the live model at startup.
    pub dimension: usize,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

pub struct HttpEmbeddingClient {
    config: EmbeddingClientConfig,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                VaultQaError::external_service("embedding", format!("client build failed: {}", e))
            })?;
        Ok(Self { config, client })
    }

    /// Embed a known probe input and verify the model's dimensionality
    /// matches the configured one. Mismatch is fatal at startup.
    pub async fn probe_dimension(&self) -> Result<()> {
        let probe = vec!["dimension probe".to_string()];
        let vectors = self.embed(&probe).await?;
        let got = vectors.first().map(|v| v.len()).unwrap_or(0);
        if got != self.config.dimension {
            return Err(VaultQaError::configuration(format!(
                "embedding model '{}' returned dimension {}, configured {}",
                self.config.model, got, self.config.dimension
            )));
        }
        Ok(())
    }
}

/// Classify an error body from the embedding server.
fn classify_error(status: reqwest::StatusCode, body: &str) -> VaultQaError {
    let lower = body.to_lowercase();
    if OVERFLOW_MARKERS.iter().any(|m| lower.contains(m)) {
        let (prompt_tokens, context_window) = extract_token_counts(body);
        return VaultQaError::EmbeddingOverflow {
            prompt_tokens,
            context_window,
        };
    }
    VaultQaError::external_service("embedding", format!("{} {}", status, body))
}

/// Pull token counts out of an error payload when the server includes them.
fn extract_token_counts(body: &str) -> (Option<u32>, Option<u32>) {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };
    (
        find_number(&parsed, "prompt_tokens"),
        find_number(&parsed, "context_window"),
    )
}

fn find_number(value: &serde_json::Value, key: &str) -> Option<u32> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(n) = map.get(key).and_then(|v| v.as_u64()) {
                return u32::try_from(n).ok();
            }
            map.values().find_map(|v| find_number(v, key))
        }
        serde_json::Value::Array(items) => items.iter().find_map(|v| find_number(v, key)),
        _ => None,
    }
}

#[async_trait]
impl EmbeddingGenerator for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.config.url.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("embedding", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            VaultQaError::external_service("embedding", format!("bad response: {}", e))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(VaultQaError::external_service(
                "embedding",
                format!("expected {} vectors, got {}", texts.len(), parsed.data.len()),
            ));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_markers_are_classified() {
        let bodies = [
            r#"{"error": {"code": "exceed_context_size"}}"#,
            r#"{"error": {"message": "This model's maximum context length is 512 tokens"}}"#,
            "context_length_exceeded",
            "request had too many tokens",
        ];
        for body in bodies {
            let err = classify_error(reqwest::StatusCode::BAD_REQUEST, body);
            assert!(err.is_embedding_overflow(), "not overflow for: {}", body);
        }
    }

    #[test]
    fn other_errors_are_external_service() {
        let err = classify_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "upstream exploded",
        );
        assert!(matches!(err, VaultQaError::ExternalService { .. }));
    }

    #[test]
    fn token_counts_extracted_when_present() {
        let body = r#"{"error": {"code": "exceed_context_size",
                       "details": {"prompt_tokens": 912, "context_window": 512}}}"#;
        let err = classify_error(reqwest::StatusCode::BAD_REQUEST, body);
        match err {
            VaultQaError::EmbeddingOverflow {
                prompt_tokens,
                context_window,
            } => {
                assert_eq!(prompt_tokens, Some(912));
                assert_eq!(context_window, Some(512));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
