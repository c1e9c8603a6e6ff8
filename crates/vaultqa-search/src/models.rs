use serde::{Deserialize, Serialize};
use vaultqa_core::{values::Score, Uuid};

/// Requested answer depth; drives the base of the automatic K selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    #[default]
    Normal,
    Detailed,
}

/// A search hit that survived pooling and is considered for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: Uuid,
    pub note_id: Uuid,
    pub vault_name: String,
    pub rel_path: String,
    pub heading_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub vector_score: Score,
    pub lexical_score: Score,
    pub final_score: Score,
}

/// A citation-matched evidence record returned with the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub vault: String,
    pub rel_path: String,
    pub heading_path: String,
    pub chunk_index: usize,
}

impl Reference {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            vault: candidate.vault_name.clone(),
            rel_path: candidate.rel_path.clone(),
            heading_path: candidate.heading_path.clone(),
            chunk_index: candidate.chunk_index,
        }
    }
}

/// Candidate counts observed at each retrieval gate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GateCounts {
    pub raw: usize,
    pub deduplicated: usize,
    pub post_vector_threshold: usize,
    pub post_final_threshold: usize,
    pub selected: usize,
}

/// Reason tag for a deliberate empty selection.
pub const NO_RELEVANT_CONTEXT: &str = "no_relevant_context";

/// Result of the retrieval + rerank phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// Selected candidates in final-score order; empty on abstention.
    pub candidates: Vec<Candidate>,
    pub counts: GateCounts,
    pub abstain_reason: Option<String>,
}

impl RetrievalOutcome {
    pub fn selected(candidates: Vec<Candidate>, counts: GateCounts) -> Self {
        Self {
            candidates,
            counts,
            abstain_reason: None,
        }
    }

    pub fn abstained(counts: GateCounts) -> Self {
        Self {
            candidates: Vec::new(),
            counts,
            abstain_reason: Some(NO_RELEVANT_CONTEXT.to_string()),
        }
    }

    pub fn is_abstained(&self) -> bool {
        self.abstain_reason.is_some()
    }
}
