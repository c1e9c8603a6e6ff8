use crate::{DateTime, Utc, Uuid};
use serde::{Deserialize, Serialize};

/// A named directory root whose `.md` files form part of the corpus.
///
/// Created on first registration of a configured vault; never deleted by the
/// core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    pub id: i64,
    pub name: String,
    pub root_path: String,
}

/// One Markdown file of a vault.
///
/// `(vault_id, rel_path)` is unique. The id is minted on first index and
/// stable across content updates; `content_hash` is the SHA-256 of the raw
/// file bytes and is only persisted after both stores hold the note's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub vault_id: i64,
    pub rel_path: String,
    /// All path components of `rel_path` except the filename, joined with
    /// forward slashes; empty for root-level files.
    pub folder: String,
    pub title: String,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// A passage of a note: the unit of embedding and retrieval.
///
/// Chunk ids are regenerated on every reindex of the parent note; consumers
/// must not persist them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub note_id: Uuid,
    pub chunk_index: usize,
    /// Heading breadcrumb reaching this chunk, e.g. `"# A > ## B"`.
    pub heading_path: String,
    pub text: String,
}

/// Outcome of indexing a single note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteIndexResult {
    /// The stored content hash matched; nothing was written.
    Unchanged,
    Indexed(NoteIndexStats),
}

/// Chunk counters for one `index_note` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteIndexStats {
    pub total_chunks: usize,
    pub indexed_chunks: usize,
    pub skipped_chunks: usize,
}

/// Summary of a bulk index run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub files: usize,
    pub successes: usize,
    pub errors: Vec<String>,
    pub chunks_indexed: usize,
    pub chunks_skipped: usize,
    pub elapsed_ms: u64,
}

impl IndexSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
