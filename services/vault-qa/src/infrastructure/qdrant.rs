//! Qdrant vector store adapter.
//!
//! Implements the `VectorRepository` trait against Qdrant's REST API. The
//! adapter owns batching for upserts and deletes; callers hand it whole
//! point sets.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;
use vaultqa_core::{Result, VaultQaError};
use vaultqa_vector::{PointPayload, ScopeFilter, ScoredPoint, VectorPoint, VectorRepository};

const UPSERT_BATCH: usize = 64;

/// Qdrant-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection_name: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection_name: "vaultqa_chunks".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

pub struct QdrantRestStore {
    config: QdrantConfig,
    client: Client,
}

impl QdrantRestStore {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                VaultQaError::external_service("qdrant", format!("client build failed: {}", e))
            })?;
        Ok(Self { config, client })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.url.trim_end_matches('/'),
            self.config.collection_name,
            suffix
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn check(&self, response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(VaultQaError::external_service(
            "qdrant",
            format!("{} failed: {} {}", action, status, body),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: serde_json::Value,
    score: f32,
    payload: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

fn filter_clauses(filter: &ScopeFilter) -> serde_json::Value {
    let mut must = vec![json!({ "key": "vault_id", "match": { "value": filter.vault_id } })];
    if let Some(folder) = &filter.folder {
        must.push(json!({ "key": "folder", "match": { "value": folder } }));
    }
    json!({ "must": must })
}

fn decode_hit(hit: SearchHit) -> Option<ScoredPoint> {
    let id = match &hit.id {
        serde_json::Value::String(s) => Uuid::parse_str(s).ok()?,
        _ => return None,
    };
    let payload = hit.payload?;
    let payload: PointPayload =
        serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect())).ok()?;
    Some(ScoredPoint {
        id,
        score: hit.score.clamp(0.0, 1.0),
        payload,
    })
}

#[async_trait]
impl VectorRepository for QdrantRestStore {
    async fn ensure_collection(&self, vector_size: usize) -> Result<()> {
        let response = self
            .request(self.client.get(self.collection_url("")))
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;

        if response.status().is_success() {
            let info: CollectionInfoResponse = response.json().await.map_err(|e| {
                VaultQaError::external_service("qdrant", format!("bad collection info: {}", e))
            })?;
            let existing = info.result.config.params.vectors.size;
            if existing != vector_size {
                return Err(VaultQaError::configuration(format!(
                    "collection '{}' has vector size {}, expected {}",
                    self.config.collection_name, existing, vector_size
                )));
            }
            return Ok(());
        }

        if response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VaultQaError::external_service(
                "qdrant",
                format!("collection lookup failed: {} {}", status, body),
            ));
        }

        tracing::info!(
            collection = %self.config.collection_name,
            size = vector_size,
            "creating vector collection"
        );
        let body = json!({ "vectors": { "size": vector_size, "distance": "Cosine" } });
        let response = self
            .request(self.client.put(self.collection_url("")).json(&body))
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;
        self.check(response, "collection create").await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        for batch in points.chunks(UPSERT_BATCH) {
            let body = json!({
                "points": batch.iter().map(|p| {
                    json!({
                        "id": p.id.to_string(),
                        "vector": p.vector,
                        "payload": p.payload,
                    })
                }).collect::<Vec<_>>()
            });
            let response = self
                .request(
                    self.client
                        .put(self.collection_url("/points?wait=true"))
                        .json(&body),
                )
                .send()
                .await
                .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;
            self.check(response, "points upsert").await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: &ScopeFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
            "filter": filter_clauses(filter),
        });
        let response = self
            .request(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;
        let response = self.check(response, "search").await?;
        let parsed: SearchResponse = response.json().await.map_err(|e| {
            VaultQaError::external_service("qdrant", format!("bad search response: {}", e))
        })?;

        let mut hits = Vec::with_capacity(parsed.result.len());
        for hit in parsed.result {
            match decode_hit(hit) {
                Some(point) => hits.push(point),
                None => tracing::warn!("dropping search hit with undecodable id or payload"),
            }
        }
        Ok(hits)
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for batch in ids.chunks(UPSERT_BATCH) {
            let body = json!({
                "points": batch.iter().map(|id| id.to_string()).collect::<Vec<_>>()
            });
            let response = self
                .request(
                    self.client
                        .post(self.collection_url("/points/delete?wait=true"))
                        .json(&body),
                )
                .send()
                .await
                .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;
            self.check(response, "points delete").await?;
        }
        Ok(())
    }

    async fn point_count(&self) -> Result<usize> {
        let response = self
            .request(
                self.client
                    .post(self.collection_url("/points/count"))
                    .json(&json!({ "exact": true })),
            )
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("qdrant", e.to_string()))?;
        let response = self.check(response, "count").await?;
        let parsed: CountResponse = response.json().await.map_err(|e| {
            VaultQaError::external_service("qdrant", format!("bad count response: {}", e))
        })?;
        Ok(parsed.result.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serializes_vault_only_scope() {
        let clauses = filter_clauses(&ScopeFilter::vault(3));
        let must = clauses["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["key"], "vault_id");
        assert_eq!(must[0]["match"]["value"], 3);
    }

    #[test]
    fn filter_serializes_folder_scope_as_conjunction() {
        let clauses = filter_clauses(&ScopeFilter::folder(1, "projects"));
        let must = clauses["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[1]["key"], "folder");
        assert_eq!(must[1]["match"]["value"], "projects");
    }

    #[test]
    fn decode_hit_requires_uuid_id_and_payload() {
        let payload: HashMap<String, serde_json::Value> = serde_json::from_value(json!({
            "vault_id": 1,
            "vault_name": "personal",
            "note_id": Uuid::new_v4().to_string(),
            "rel_path": "a.md",
            "folder": "",
            "heading_path": "# A",
            "chunk_index": 0,
            "note_title": "A",
        }))
        .unwrap();

        let ok = decode_hit(SearchHit {
            id: serde_json::Value::String(Uuid::new_v4().to_string()),
            score: 0.9,
            payload: Some(payload.clone()),
        });
        assert!(ok.is_some());

        let bad_id = decode_hit(SearchHit {
            id: serde_json::Value::Number(7.into()),
            score: 0.9,
            payload: Some(payload),
        });
        assert!(bad_id.is_none());
    }

    #[test]
    fn scores_are_clamped_into_unit_interval() {
        let payload: HashMap<String, serde_json::Value> = serde_json::from_value(json!({
            "vault_id": 1,
            "vault_name": "v",
            "note_id": Uuid::new_v4().to_string(),
            "rel_path": "a.md",
            "folder": "",
            "heading_path": "# A",
            "chunk_index": 0,
            "note_title": "A",
        }))
        .unwrap();
        let hit = decode_hit(SearchHit {
            id: serde_json::Value::String(Uuid::new_v4().to_string()),
            score: 1.3,
            payload: Some(payload),
        })
        .unwrap();
        assert_eq!(hit.score, 1.0);
    }
}
