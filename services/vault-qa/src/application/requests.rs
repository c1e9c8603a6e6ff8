//! Request and response types for the query and index APIs.

use serde::{Deserialize, Serialize};
use vaultqa_core::models::IndexSummary;
use vaultqa_search::{Candidate, DetailLevel, Reference};

/// `ask` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Vault names to search; empty means all.
    #[serde(default)]
    pub vaults: Vec<String>,
    /// Free-form folder hints.
    #[serde(default)]
    pub folders: Vec<String>,
    /// Explicit K; `0` (the default) auto-selects, out-of-range values are
    /// clamped.
    #[serde(default)]
    pub k: usize,
    #[serde(default)]
    pub detail: Option<DetailLevel>,
    #[serde(default)]
    pub debug: bool,
}

/// `ask` response.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstained: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstain_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Debug payload attached when the request asked for it.
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub retrieved_chunks: Vec<Candidate>,
    pub folder_selection: FolderSelectionDebug,
    pub latency: LatencyDebug,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderSelectionDebug {
    pub selected: Vec<String>,
    pub available: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyDebug {
    pub folder_selection_ms: u64,
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}

/// `index` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexRequest {
    /// When true, a clear-all precedes the bulk index.
    #[serde(default)]
    pub force: bool,
}

/// `index` response.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub status: String,
    #[serde(flatten)]
    pub summary: IndexSummary,
}

/// `status` response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub collection: String,
    pub notes: usize,
    pub chunks: usize,
    pub points: usize,
    pub vector_dimension: usize,
    pub embedding_model: String,
    pub chat_model: String,
}
