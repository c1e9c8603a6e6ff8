use serde::{Deserialize, Serialize};
use vaultqa_core::Uuid;

/// Payload attached to every vector point.
///
/// Carries the fields needed for filtering and for displaying results without
/// a metadata-store round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub vault_id: i64,
    pub vault_name: String,
    pub note_id: Uuid,
    pub rel_path: String,
    pub folder: String,
    pub heading_path: String,
    pub chunk_index: usize,
    pub note_title: String,
}

/// A dense vector with its payload, keyed by the owning chunk's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A single search hit.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    /// Cosine similarity in `[0, 1]`.
    pub score: f32,
    pub payload: PointPayload,
}

/// Conjunction of payload-equality predicates for one dense search call.
///
/// `folder: None` scopes to a whole vault; `Some` narrows to one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    pub vault_id: i64,
    pub folder: Option<String>,
}

impl ScopeFilter {
    pub fn vault(vault_id: i64) -> Self {
        Self {
            vault_id,
            folder: None,
        }
    }

    pub fn folder(vault_id: i64, folder: impl Into<String>) -> Self {
        Self {
            vault_id,
            folder: Some(folder.into()),
        }
    }

    /// True when the given payload satisfies every predicate.
    pub fn matches(&self, payload: &PointPayload) -> bool {
        if payload.vault_id != self.vault_id {
            return false;
        }
        match &self.folder {
            Some(folder) => payload.folder == *folder,
            None => true,
        }
    }
}
