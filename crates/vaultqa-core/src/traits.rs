use crate::{models::*, Result, Uuid};

/// Durable store for vaults, notes, and chunks.
///
/// Methods are synchronous: the store is local and the indexing pipeline is
/// the only writer, so callers invoke it inline from async contexts. Lookup
/// methods return `Option` rather than an error when a row is absent;
/// retrieval treats a missing chunk row as a stand-in case, not a failure.
pub trait MetadataStore: Send + Sync {
    fn vault_get_or_create(&self, name: &str, root_path: &str) -> Result<Vault>;
    fn vault_list_all(&self) -> Result<Vec<Vault>>;

    fn note_get(&self, vault_id: i64, rel_path: &str) -> Result<Option<Note>>;
    /// Insert or update a note keyed by `(vault_id, rel_path)`. The content
    /// hash is written as given; the pipeline passes the prior hash here and
    /// persists the new one via `note_set_hash` only after the vector store
    /// holds the note's points.
    fn note_upsert(&self, note: &Note) -> Result<()>;
    fn note_set_hash(&self, note_id: Uuid, content_hash: &str) -> Result<()>;
    fn note_delete_all(&self) -> Result<()>;
    /// Distinct `"<vault_id>/<folder>"` keys over the selected vaults.
    fn note_list_unique_folders(&self, vault_ids: &[i64]) -> Result<Vec<String>>;
    fn note_count(&self) -> Result<usize>;

    fn chunk_insert(&self, chunk: &Chunk) -> Result<()>;
    fn chunk_get(&self, id: Uuid) -> Result<Option<Chunk>>;
    fn chunk_list_ids_by_note(&self, note_id: Uuid) -> Result<Vec<Uuid>>;
    fn chunk_delete_by_note(&self, note_id: Uuid) -> Result<()>;
    fn chunk_delete_all(&self) -> Result<()>;
    fn chunk_get_all_ids(&self) -> Result<Vec<Uuid>>;
    fn chunk_count(&self) -> Result<usize>;
}
