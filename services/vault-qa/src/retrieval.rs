//! Retrieval + rerank engine.
//!
//! Builds the scope set from the folder selection, pools candidates from
//! parallel dense searches, fuses vector and lexical signals, and applies
//! the abstention gates.

use crate::folder_selector::{FolderSelection, FolderSelector};
use crate::util::abort_on_cancel;
use futures::future::join_all;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultqa_core::{
    traits::MetadataStore, values::split_folder_key, values::Score, Result, Uuid,
};
use vaultqa_search::{
    Candidate, DetailLevel, GateCounts, RetrievalOutcome, RetrievalPolicy,
};
use vaultqa_vector::{EmbeddingGenerator, ScopeFilter, ScoredPoint, VectorRepository};

/// One retrieval request, after HTTP-level validation.
#[derive(Debug, Clone, Default)]
pub struct RetrievalRequest {
    pub question: String,
    /// Vault names; empty means all vaults.
    pub vaults: Vec<String>,
    /// Free-form user folder hints.
    pub folders: Vec<String>,
    /// Explicit K; `0` or absent selects automatically.
    pub k: usize,
    pub detail: Option<DetailLevel>,
}

/// Retrieval phase result, with the folder selection for debug output.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub outcome: RetrievalOutcome,
    pub folder_selection: FolderSelection,
    pub folder_selection_ms: u64,
    pub retrieval_ms: u64,
}

pub struct RetrievalEngine {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorRepository>,
    embedder: Arc<dyn EmbeddingGenerator>,
    selector: FolderSelector,
    policy: RetrievalPolicy,
}

impl RetrievalEngine {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingGenerator>,
        selector: FolderSelector,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            metadata,
            vectors,
            embedder,
            selector,
            policy,
        }
    }

    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        let vaults = self.resolve_vaults(&request.vaults)?;
        let vault_ids: Vec<i64> = vaults.keys().copied().collect();

        let available = self.metadata.note_list_unique_folders(&vault_ids)?;

        let folder_started = std::time::Instant::now();
        let folder_selection = self
            .selector
            .select(
                &request.question,
                &available,
                &request.folders,
                &vaults,
                cancel,
            )
            .await?;
        let folder_selection_ms = folder_started.elapsed().as_millis() as u64;

        let retrieval_started = std::time::Instant::now();

        let target_k = match self.policy.clamp_user_k(request.k) {
            0 => self.policy.auto_k(
                &request.question,
                request.detail.unwrap_or_default(),
                !request.folders.is_empty(),
            ),
            k => k,
        };

        let scopes = build_scopes(&vault_ids, &folder_selection.selected);

        let question_vec = abort_on_cancel(cancel, async {
            let vectors = self.embedder.embed(&[request.question.clone()]).await?;
            vectors.into_iter().next().ok_or_else(|| {
                vaultqa_core::VaultQaError::external_service("embedding", "empty response")
            })
        })
        .await?;

        // One dense search per scope, in parallel; folder-scoped hits decay
        // by folder position.
        let searches = scopes.iter().map(|scope| {
            self.vectors
                .search(&question_vec, self.policy.candidate_k_per_scope, &scope.filter)
        });
        let results = abort_on_cancel(cancel, async {
            let all: Vec<Result<Vec<ScoredPoint>>> = join_all(searches).await;
            all.into_iter().collect::<Result<Vec<_>>>()
        })
        .await?;

        let mut counts = GateCounts::default();
        let mut pooled: HashMap<Uuid, (f32, ScoredPoint)> = HashMap::new();
        for (scope, hits) in scopes.iter().zip(results) {
            for hit in hits {
                counts.raw += 1;
                let weighted = match scope.folder_index {
                    Some(index) => hit.score * self.policy.position_weight(index),
                    None => hit.score,
                };
                match pooled.entry(hit.id) {
                    Entry::Occupied(mut entry) => {
                        if weighted > entry.get().0 {
                            entry.insert((weighted, hit));
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert((weighted, hit));
                    }
                }
            }
        }
        counts.deduplicated = pooled.len();
        if pooled.is_empty() {
            info!("retrieval abstained: no candidates from any scope");
            return Ok(RetrievalResult {
                outcome: RetrievalOutcome::abstained(counts),
                folder_selection,
                folder_selection_ms,
                retrieval_ms: retrieval_started.elapsed().as_millis() as u64,
            });
        }

        let mut candidates: Vec<(f32, ScoredPoint)> = pooled.into_values().collect();
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.retain(|(score, _)| *score >= self.policy.vector_floor);
        counts.post_vector_threshold = candidates.len();
        if candidates.is_empty() {
            info!("retrieval abstained: all candidates under vector floor");
            return Ok(RetrievalResult {
                outcome: RetrievalOutcome::abstained(counts),
                folder_selection,
                folder_selection_ms,
                retrieval_ms: retrieval_started.elapsed().as_millis() as u64,
            });
        }
        candidates.truncate(self.policy.max_candidates);

        let mut reranked: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for (vector_score, point) in candidates {
            reranked.push(self.rerank_one(&request.question, vector_score, point)?);
        }

        reranked.sort_by(|a, b| {
            b.final_score
                .value()
                .partial_cmp(&a.final_score.value())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.vector_score
                        .value()
                        .partial_cmp(&a.vector_score.value())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        reranked.retain(|c| c.final_score.value() >= self.policy.final_floor);
        counts.post_final_threshold = reranked.len();
        if reranked.is_empty() {
            info!("retrieval abstained: all candidates under final floor");
            return Ok(RetrievalResult {
                outcome: RetrievalOutcome::abstained(counts),
                folder_selection,
                folder_selection_ms,
                retrieval_ms: retrieval_started.elapsed().as_millis() as u64,
            });
        }

        reranked.truncate(target_k.min(self.policy.rerank_keep));
        counts.selected = reranked.len();

        for candidate in reranked.iter().take(3) {
            debug!(
                path = %candidate.rel_path,
                vector = %candidate.vector_score,
                lexical = %candidate.lexical_score,
                fused = %candidate.final_score,
                "top candidate"
            );
        }
        info!(
            raw = counts.raw,
            deduplicated = counts.deduplicated,
            post_vector = counts.post_vector_threshold,
            post_final = counts.post_final_threshold,
            selected = counts.selected,
            k = target_k,
            "retrieval gates"
        );

        Ok(RetrievalResult {
            outcome: RetrievalOutcome::selected(reranked, counts),
            folder_selection,
            folder_selection_ms,
            retrieval_ms: retrieval_started.elapsed().as_millis() as u64,
        })
    }

    /// Resolve requested vault names to `{id -> name}`; empty or fully
    /// unknown input means all vaults.
    fn resolve_vaults(&self, requested: &[String]) -> Result<HashMap<i64, String>> {
        let all = self.metadata.vault_list_all()?;
        if requested.is_empty() {
            return Ok(all.into_iter().map(|v| (v.id, v.name)).collect());
        }

        let mut resolved = HashMap::new();
        for name in requested {
            match all.iter().find(|v| v.name.eq_ignore_ascii_case(name)) {
                Some(vault) => {
                    resolved.insert(vault.id, vault.name.clone());
                }
                None => warn!(vault = %name, "unknown vault name dropped"),
            }
        }
        if resolved.is_empty() {
            return Ok(all.into_iter().map(|v| (v.id, v.name)).collect());
        }
        Ok(resolved)
    }

    /// Fetch the chunk row and compute the fused score. A missing row gets a
    /// stand-in with empty text and the heading path from the payload.
    fn rerank_one(
        &self,
        question: &str,
        vector_score: f32,
        point: ScoredPoint,
    ) -> Result<Candidate> {
        let (text, heading_path, chunk_index) = match self.metadata.chunk_get(point.id)? {
            Some(chunk) => (chunk.text, chunk.heading_path, chunk.chunk_index),
            None => {
                debug!(id = %point.id, "chunk row missing, using payload stand-in");
                (
                    String::new(),
                    point.payload.heading_path.clone(),
                    point.payload.chunk_index,
                )
            }
        };

        let lexical = self
            .policy
            .lexical_score(question, &text, &heading_path);
        let final_score = self.policy.blend(vector_score, lexical);

        Ok(Candidate {
            chunk_id: point.id,
            note_id: point.payload.note_id,
            vault_name: point.payload.vault_name,
            rel_path: point.payload.rel_path,
            heading_path,
            chunk_index,
            text,
            vector_score: Score::clamped(vector_score),
            lexical_score: Score::clamped(lexical),
            final_score: Score::clamped(final_score),
        })
    }
}

struct Scope {
    filter: ScopeFilter,
    /// Position in the ordered folder list; `None` for vault-only scopes,
    /// which search unweighted.
    folder_index: Option<usize>,
}

/// Turn the ordered folder selection into the scope set. An empty selection
/// falls back to one vault-wide scope per vault.
fn build_scopes(vault_ids: &[i64], selected_folders: &[String]) -> Vec<Scope> {
    let mut scopes = Vec::new();
    for (index, key) in selected_folders.iter().enumerate() {
        let Some((vault_id, folder)) = split_folder_key(key) else {
            continue;
        };
        if !vault_ids.contains(&vault_id) {
            continue;
        }
        scopes.push(Scope {
            filter: ScopeFilter::folder(vault_id, folder),
            folder_index: Some(index),
        });
    }

    if scopes.is_empty() {
        for vault_id in vault_ids {
            scopes.push(Scope {
                filter: ScopeFilter::vault(*vault_id),
                folder_index: None,
            });
        }
    }
    scopes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_from_folder_selection_keep_order() {
        let scopes = build_scopes(&[1, 2], &["1/projects".to_string(), "2/notes".to_string()]);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].filter, ScopeFilter::folder(1, "projects"));
        assert_eq!(scopes[0].folder_index, Some(0));
        assert_eq!(scopes[1].filter, ScopeFilter::folder(2, "notes"));
        assert_eq!(scopes[1].folder_index, Some(1));
    }

    #[test]
    fn empty_selection_searches_whole_vaults() {
        let scopes = build_scopes(&[1, 2], &[]);
        assert_eq!(scopes.len(), 2);
        assert!(scopes.iter().all(|s| s.folder_index.is_none()));
        assert_eq!(scopes[0].filter, ScopeFilter::vault(1));
    }

    #[test]
    fn folders_outside_vault_set_are_dropped() {
        let scopes = build_scopes(&[1], &["9/projects".to_string()]);
        // Falls through to the vault-wide scope.
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].filter, ScopeFilter::vault(1));
    }
}
