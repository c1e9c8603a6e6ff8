//! SQLite metadata store.
//!
//! Holds the three durable relations: vaults, notes, and chunks. The
//! indexing pipeline is the only writer, so a single connection behind a
//! mutex is sufficient; queries read through the same handle.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;
use vaultqa_core::{
    models::{Chunk, Note, Vault},
    traits::MetadataStore,
    values::folder_key,
    Result, VaultQaError,
};

pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS vaults (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                root_path TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                vault_id INTEGER NOT NULL REFERENCES vaults(id),
                rel_path TEXT NOT NULL,
                folder TEXT NOT NULL,
                title TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (vault_id, rel_path)
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                note_id TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                heading_path TEXT NOT NULL,
                text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_note ON chunks(note_id);
            CREATE INDEX IF NOT EXISTS idx_notes_folder ON notes(vault_id, folder);
            "#,
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultQaError::internal("metadata store mutex poisoned"))
    }
}

fn db_err(e: rusqlite::Error) -> VaultQaError {
    VaultQaError::database(e.to_string())
}

fn parse_uuid(text: String) -> Result<Uuid> {
    Uuid::parse_str(&text)
        .map_err(|e| VaultQaError::internal(format!("malformed uuid in store: {}", e)))
}

fn parse_timestamp(text: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MetadataStore for SqliteMetadataStore {
    fn vault_get_or_create(&self, name: &str, root_path: &str) -> Result<Vault> {
        let conn = self.lock()?;
        let existing: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, root_path FROM vaults WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        if let Some((id, stored_root)) = existing {
            if stored_root != root_path {
                conn.execute(
                    "UPDATE vaults SET root_path = ?1 WHERE id = ?2",
                    params![root_path, id],
                )
                .map_err(db_err)?;
            }
            return Ok(Vault {
                id,
                name: name.to_string(),
                root_path: root_path.to_string(),
            });
        }

        conn.execute(
            "INSERT INTO vaults (name, root_path) VALUES (?1, ?2)",
            params![name, root_path],
        )
        .map_err(db_err)?;
        Ok(Vault {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            root_path: root_path.to_string(),
        })
    }

    fn vault_list_all(&self) -> Result<Vec<Vault>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, root_path FROM vaults ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Vault {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    root_path: row.get(2)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }

    fn note_get(&self, vault_id: i64, rel_path: &str) -> Result<Option<Note>> {
        let conn = self.lock()?;
        let row: Option<(String, String, String, String, String)> = conn
            .query_row(
                "SELECT id, folder, title, content_hash, updated_at
                 FROM notes WHERE vault_id = ?1 AND rel_path = ?2",
                params![vault_id, rel_path],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some((id, folder, title, content_hash, updated_at)) => Ok(Some(Note {
                id: parse_uuid(id)?,
                vault_id,
                rel_path: rel_path.to_string(),
                folder,
                title,
                content_hash,
                updated_at: parse_timestamp(updated_at),
            })),
        }
    }

    fn note_upsert(&self, note: &Note) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (id, vault_id, rel_path, folder, title, content_hash, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (vault_id, rel_path) DO UPDATE SET
                 folder = excluded.folder,
                 title = excluded.title,
                 content_hash = excluded.content_hash,
                 updated_at = excluded.updated_at",
            params![
                note.id.to_string(),
                note.vault_id,
                note.rel_path,
                note.folder,
                note.title,
                note.content_hash,
                note.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn note_set_hash(&self, note_id: Uuid, content_hash: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE notes SET content_hash = ?1 WHERE id = ?2",
                params![content_hash, note_id.to_string()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(VaultQaError::not_found(format!("note {}", note_id)));
        }
        Ok(())
    }

    fn note_delete_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM notes", []).map_err(db_err)?;
        Ok(())
    }

    fn note_list_unique_folders(&self, vault_ids: &[i64]) -> Result<Vec<String>> {
        if vault_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; vault_ids.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT vault_id, folder FROM notes
             WHERE vault_id IN ({}) ORDER BY vault_id, folder",
            placeholders
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(vault_ids.iter()), |row| {
                let vault_id: i64 = row.get(0)?;
                let folder: String = row.get(1)?;
                Ok(folder_key(vault_id, &folder))
            })
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }

    fn note_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(db_err)
    }

    fn chunk_insert(&self, chunk: &Chunk) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chunks (id, note_id, chunk_index, heading_path, text)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chunk.id.to_string(),
                chunk.note_id.to_string(),
                chunk.chunk_index as i64,
                chunk.heading_path,
                chunk.text,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn chunk_get(&self, id: Uuid) -> Result<Option<Chunk>> {
        let conn = self.lock()?;
        let row: Option<(String, i64, String, String)> = conn
            .query_row(
                "SELECT note_id, chunk_index, heading_path, text FROM chunks WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some((note_id, chunk_index, heading_path, text)) => Ok(Some(Chunk {
                id,
                note_id: parse_uuid(note_id)?,
                chunk_index: chunk_index as usize,
                heading_path,
                text,
            })),
        }
    }

    fn chunk_list_ids_by_note(&self, note_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM chunks WHERE note_id = ?1 ORDER BY chunk_index")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![note_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        let ids = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        ids.into_iter().map(parse_uuid).collect()
    }

    fn chunk_delete_by_note(&self, note_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM chunks WHERE note_id = ?1",
            params![note_id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn chunk_delete_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chunks", []).map_err(db_err)?;
        Ok(())
    }

    fn chunk_get_all_ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM chunks").map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        let ids = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        ids.into_iter().map(parse_uuid).collect()
    }

    fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(vault_id: i64, rel_path: &str, hash: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            vault_id,
            rel_path: rel_path.to_string(),
            folder: rel_path
                .rsplit_once('/')
                .map(|(f, _)| f.to_string())
                .unwrap_or_default(),
            title: "Title".to_string(),
            content_hash: hash.to_string(),
            updated_at: Utc::now(),
        }
    }

    fn chunk(note_id: Uuid, index: usize) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            note_id,
            chunk_index: index,
            heading_path: "# H".to_string(),
            text: "text".to_string(),
        }
    }

    #[test]
    fn vault_get_or_create_is_idempotent() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let a = store.vault_get_or_create("personal", "/tmp/v").unwrap();
        let b = store.vault_get_or_create("personal", "/tmp/v").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.vault_list_all().unwrap().len(), 1);
    }

    #[test]
    fn note_upsert_keeps_id_on_update() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let vault = store.vault_get_or_create("v", "/tmp/v").unwrap();

        let original = note(vault.id, "projects/a.md", "hash1");
        store.note_upsert(&original).unwrap();

        // Same (vault_id, rel_path), different candidate id: row is updated,
        // stored id is unchanged.
        let mut updated = note(vault.id, "projects/a.md", "hash2");
        updated.title = "New".to_string();
        store.note_upsert(&updated).unwrap();

        let stored = store.note_get(vault.id, "projects/a.md").unwrap().unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.title, "New");
        assert_eq!(stored.content_hash, "hash2");
        assert_eq!(store.note_count().unwrap(), 1);
    }

    #[test]
    fn note_set_hash_updates_only_hash() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let vault = store.vault_get_or_create("v", "/tmp/v").unwrap();
        let n = note(vault.id, "a.md", "");
        store.note_upsert(&n).unwrap();
        store.note_set_hash(n.id, "finalhash").unwrap();
        let stored = store.note_get(vault.id, "a.md").unwrap().unwrap();
        assert_eq!(stored.content_hash, "finalhash");
    }

    #[test]
    fn deleting_note_rows_cascades_to_chunks() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let vault = store.vault_get_or_create("v", "/tmp/v").unwrap();
        let n = note(vault.id, "a.md", "h");
        store.note_upsert(&n).unwrap();
        store.chunk_insert(&chunk(n.id, 0)).unwrap();
        store.chunk_insert(&chunk(n.id, 1)).unwrap();
        assert_eq!(store.chunk_count().unwrap(), 2);

        store.note_delete_all().unwrap();
        assert_eq!(store.chunk_count().unwrap(), 0);
    }

    #[test]
    fn unique_folders_are_key_qualified_and_distinct() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let v1 = store.vault_get_or_create("one", "/tmp/1").unwrap();
        let v2 = store.vault_get_or_create("two", "/tmp/2").unwrap();
        store.note_upsert(&note(v1.id, "projects/a.md", "h")).unwrap();
        store.note_upsert(&note(v1.id, "projects/b.md", "h")).unwrap();
        store.note_upsert(&note(v1.id, "root.md", "h")).unwrap();
        store.note_upsert(&note(v2.id, "projects/c.md", "h")).unwrap();

        let folders = store.note_list_unique_folders(&[v1.id]).unwrap();
        assert_eq!(
            folders,
            vec![format!("{}/", v1.id), format!("{}/projects", v1.id)]
        );

        let all = store.note_list_unique_folders(&[v1.id, v2.id]).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn chunk_ids_listed_in_index_order() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let vault = store.vault_get_or_create("v", "/tmp/v").unwrap();
        let n = note(vault.id, "a.md", "h");
        store.note_upsert(&n).unwrap();
        let c0 = chunk(n.id, 0);
        let c1 = chunk(n.id, 1);
        store.chunk_insert(&c1).unwrap();
        store.chunk_insert(&c0).unwrap();
        assert_eq!(store.chunk_list_ids_by_note(n.id).unwrap(), vec![c0.id, c1.id]);
    }

    #[test]
    fn chunk_get_round_trips() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let vault = store.vault_get_or_create("v", "/tmp/v").unwrap();
        let n = note(vault.id, "a.md", "h");
        store.note_upsert(&n).unwrap();
        let c = chunk(n.id, 0);
        store.chunk_insert(&c).unwrap();
        let stored = store.chunk_get(c.id).unwrap().unwrap();
        assert_eq!(stored.note_id, n.id);
        assert_eq!(stored.heading_path, "# H");
        assert!(store.chunk_get(Uuid::new_v4()).unwrap().is_none());
    }
}
