//! Vault scanning.
//!
//! Walks each vault root and yields the `.md` files to index. Errors on
//! individual entries are logged and the walk continues; cancellation is
//! honored at directory boundaries.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vaultqa_core::{models::Vault, Result, VaultQaError};
use walkdir::WalkDir;

/// One `.md` file discovered in a vault.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub vault_id: i64,
    pub rel_path: String,
    pub folder: String,
    pub abs_path: PathBuf,
}

/// Walk a vault root and collect its Markdown files.
///
/// Directories named `.obsidian` are skipped entirely.
pub fn scan_vault(vault: &Vault, cancel: &CancellationToken) -> Result<Vec<ScannedFile>> {
    let root = Path::new(&vault.root_path);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_obsidian_dir(e.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(vault = %vault.name, error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            if cancel.is_cancelled() {
                return Err(VaultQaError::Cancelled);
            }
            continue;
        }

        if entry.path().extension().map(|e| e == "md").unwrap_or(false) {
            match to_scanned(vault, root, entry.path()) {
                Some(file) => files.push(file),
                None => {
                    warn!(vault = %vault.name, path = %entry.path().display(),
                          "file outside vault root, skipping");
                }
            }
        }
    }

    Ok(files)
}

fn is_obsidian_dir(path: &Path) -> bool {
    path.file_name().map(|n| n == ".obsidian").unwrap_or(false)
}

fn to_scanned(vault: &Vault, root: &Path, path: &Path) -> Option<ScannedFile> {
    let rel = path.strip_prefix(root).ok()?;
    let components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let rel_path = components.join("/");
    let folder = if components.len() > 1 {
        components[..components.len() - 1].join("/")
    } else {
        String::new()
    };

    Some(ScannedFile {
        vault_id: vault.id,
        rel_path,
        folder,
        abs_path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vault_at(dir: &Path) -> Vault {
        Vault {
            id: 1,
            name: "test".to_string(),
            root_path: dir.to_string_lossy().to_string(),
        }
    }

    #[test]
    fn finds_markdown_files_with_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("projects/alpha")).unwrap();
        fs::write(dir.path().join("root.md"), "# Root").unwrap();
        fs::write(dir.path().join("projects/alpha/plan.md"), "# Plan").unwrap();
        fs::write(dir.path().join("projects/readme.txt"), "not markdown").unwrap();

        let mut files =
            scan_vault(&vault_at(dir.path()), &CancellationToken::new()).unwrap();
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].rel_path, "projects/alpha/plan.md");
        assert_eq!(files[0].folder, "projects/alpha");
        assert_eq!(files[1].rel_path, "root.md");
        assert_eq!(files[1].folder, "");
    }

    #[test]
    fn skips_obsidian_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".obsidian/plugins")).unwrap();
        fs::write(dir.path().join(".obsidian/workspace.md"), "config").unwrap();
        fs::write(dir.path().join("note.md"), "# Note").unwrap();

        let files = scan_vault(&vault_at(dir.path()), &CancellationToken::new()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "note.md");
    }

    #[test]
    fn cancelled_walk_stops_at_directory_boundary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.md"), "# Note").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = scan_vault(&vault_at(dir.path()), &token);
        assert!(matches!(result, Err(VaultQaError::Cancelled)));
    }
}
