//! Indexing pipeline.
//!
//! Coordinates the scanner, chunker, metadata store, embedding client, and
//! vector store. Per note, the write order is: note upsert, chunk inserts,
//! point upserts, and only then the new content hash. A crash between the
//! stores leaves the stale hash in place, so the next run redoes the note
//! instead of certifying a half-finished write.

use crate::chunker::MarkdownChunker;
use crate::scanner::{scan_vault, ScannedFile};
use crate::util::abort_on_cancel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vaultqa_core::{
    models::{Chunk, Note, NoteIndexResult, NoteIndexStats, IndexSummary, Vault},
    traits::MetadataStore,
    Result, Utc, VaultQaError,
};
use vaultqa_vector::{EmbeddingGenerator, PointPayload, VectorPoint, VectorRepository};

/// Bounds for one embedding request batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_len: usize,
    pub max_batch_chars: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_len: 32,
            max_batch_chars: 16_000,
        }
    }
}

pub struct IndexingPipeline {
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorRepository>,
    embedder: Arc<dyn EmbeddingGenerator>,
    chunker: MarkdownChunker,
    batching: BatchConfig,
    /// Serializes bulk operations: one indexing operation at a time.
    run_lock: tokio::sync::Mutex<()>,
}

impl IndexingPipeline {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingGenerator>,
        chunker: MarkdownChunker,
        batching: BatchConfig,
    ) -> Self {
        Self {
            metadata,
            vectors,
            embedder,
            chunker,
            batching,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Index every `.md` file of every registered vault.
    ///
    /// Per-file failures are recorded and the walk continues; cancellation
    /// is honored between files.
    pub async fn index_all(&self, cancel: &CancellationToken) -> Result<IndexSummary> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let mut summary = IndexSummary::default();

        let vaults = self.metadata.vault_list_all()?;
        for vault in &vaults {
            let files = match scan_vault(vault, cancel) {
                Ok(files) => files,
                Err(VaultQaError::Cancelled) => return Err(VaultQaError::Cancelled),
                Err(e) => {
                    warn!(vault = %vault.name, error = %e, "vault scan failed");
                    summary.errors.push(format!("{}: {}", vault.name, e));
                    continue;
                }
            };

            for file in files {
                if cancel.is_cancelled() {
                    return Err(VaultQaError::Cancelled);
                }
                summary.files += 1;
                match self.index_note(vault, &file, cancel).await {
                    Ok(NoteIndexResult::Unchanged) => summary.successes += 1,
                    Ok(NoteIndexResult::Indexed(stats)) => {
                        summary.successes += 1;
                        summary.chunks_indexed += stats.indexed_chunks;
                        summary.chunks_skipped += stats.skipped_chunks;
                    }
                    Err(VaultQaError::Cancelled) => return Err(VaultQaError::Cancelled),
                    Err(e) => {
                        warn!(path = %file.rel_path, error = %e, "note index failed");
                        summary.errors.push(format!("{}: {}", file.rel_path, e));
                    }
                }
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            files = summary.files,
            successes = summary.successes,
            errors = summary.errors.len(),
            chunks = summary.chunks_indexed,
            skipped = summary.chunks_skipped,
            "bulk index finished"
        );
        Ok(summary)
    }

    /// Index a single note file.
    pub async fn index_note(
        &self,
        vault: &Vault,
        file: &ScannedFile,
        cancel: &CancellationToken,
    ) -> Result<NoteIndexResult> {
        let bytes = tokio::fs::read(&file.abs_path).await?;
        let content_hash = hex_sha256(&bytes);

        let existing = self.metadata.note_get(vault.id, &file.rel_path)?;
        if let Some(note) = &existing {
            if note.content_hash == content_hash {
                debug!(path = %file.rel_path, "content hash unchanged, skipping");
                return Ok(NoteIndexResult::Unchanged);
            }
        }

        let content = String::from_utf8_lossy(&bytes);
        let file_name = file
            .rel_path
            .rsplit('/')
            .next()
            .unwrap_or(&file.rel_path)
            .to_string();
        let chunked = self.chunker.chunk(&content, &file_name);

        // The note row is written before any chunk, with the prior hash (or
        // none): the hash-guarded skip must not fire until both stores hold
        // the new chunks.
        let note_id = existing.as_ref().map(|n| n.id).unwrap_or_else(Uuid::new_v4);
        let prior_hash = existing
            .as_ref()
            .map(|n| n.content_hash.clone())
            .unwrap_or_default();
        self.metadata.note_upsert(&Note {
            id: note_id,
            vault_id: vault.id,
            rel_path: file.rel_path.clone(),
            folder: file.folder.clone(),
            title: chunked.title.clone(),
            content_hash: prior_hash,
            updated_at: Utc::now(),
        })?;

        if existing.is_some() {
            let old_ids = self.metadata.chunk_list_ids_by_note(note_id)?;
            if let Err(e) = self.vectors.delete(&old_ids).await {
                warn!(path = %file.rel_path, error = %e,
                      "stale vector delete failed, continuing");
            }
            self.metadata.chunk_delete_by_note(note_id)?;
        }

        let texts: Vec<String> = chunked.passages.iter().map(|p| p.text.clone()).collect();
        let embeddings =
            abort_on_cancel(cancel, self.embed_adaptive(&texts)).await?;

        let mut stats = NoteIndexStats {
            total_chunks: chunked.passages.len(),
            ..Default::default()
        };
        let mut points = Vec::new();
        let mut chunk_index = 0usize;

        for (passage, embedding) in chunked.passages.iter().zip(embeddings) {
            let Some(vector) = embedding else {
                stats.skipped_chunks += 1;
                continue;
            };
            let chunk = Chunk {
                id: Uuid::new_v4(),
                note_id,
                chunk_index,
                heading_path: passage.heading_path.clone(),
                text: passage.text.clone(),
            };
            self.metadata.chunk_insert(&chunk)?;
            points.push(VectorPoint {
                id: chunk.id,
                vector,
                payload: PointPayload {
                    vault_id: vault.id,
                    vault_name: vault.name.clone(),
                    note_id,
                    rel_path: file.rel_path.clone(),
                    folder: file.folder.clone(),
                    heading_path: passage.heading_path.clone(),
                    chunk_index,
                    note_title: chunked.title.clone(),
                },
            });
            chunk_index += 1;
            stats.indexed_chunks += 1;
        }

        abort_on_cancel(cancel, self.vectors.upsert(points)).await?;
        self.metadata.note_set_hash(note_id, &content_hash)?;

        debug!(
            path = %file.rel_path,
            total = stats.total_chunks,
            indexed = stats.indexed_chunks,
            skipped = stats.skipped_chunks,
            "note indexed"
        );
        Ok(NoteIndexResult::Indexed(stats))
    }

    /// Remove every chunk and note; vaults are preserved.
    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.run_lock.lock().await;
        let ids = self.metadata.chunk_get_all_ids()?;
        if let Err(e) = self.vectors.delete(&ids).await {
            warn!(error = %e, "vector clear failed, proceeding with metadata truncate");
        }
        self.metadata.chunk_delete_all()?;
        self.metadata.note_delete_all()?;
        info!(points = ids.len(), "cleared all notes and chunks");
        Ok(())
    }

    /// Embed texts in batches bounded by count and total code points.
    ///
    /// A batch that overflows the model's context window is split at its
    /// midpoint and retried; a single text that still overflows is skipped
    /// (`None`) with a warning. Any other error aborts the note.
    async fn embed_adaptive(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        // Ranges to embed, processed as a work stack so midpoint splits do
        // not need recursive async calls.
        let mut work: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        while start < texts.len() {
            let mut end = start;
            let mut chars = 0;
            while end < texts.len()
                && end - start < self.batching.max_batch_len
                && (end == start
                    || chars + texts[end].chars().count() <= self.batching.max_batch_chars)
            {
                chars += texts[end].chars().count();
                end += 1;
            }
            work.push((start, end));
            start = end;
        }
        work.reverse();

        while let Some((start, end)) = work.pop() {
            let slice = &texts[start..end];
            match self.embedder.embed(slice).await {
                Ok(vectors) => {
                    for (offset, vector) in vectors.into_iter().enumerate() {
                        out[start + offset] = Some(vector);
                    }
                }
                Err(e) if e.is_embedding_overflow() => {
                    if end - start == 1 {
                        warn!(
                            chars = texts[start].chars().count(),
                            error = %e,
                            "chunk exceeds embedding context window, skipping"
                        );
                    } else {
                        let mid = start + (end - start) / 2;
                        work.push((mid, end));
                        work.push((start, mid));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(out)
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_hex_of_raw_bytes() {
        let hash = hex_sha256(b"hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
