//! Configuration management for the vault-qa service.
//!
//! Configuration is loaded from a TOML file or from environment variables,
//! validated once, and passed as a single value to the service container.

use crate::chunker::ChunkerConfig;
use crate::indexing::BatchConfig;
use crate::infrastructure::http::ServerConfig;
use crate::infrastructure::{ChatClientConfig, EmbeddingClientConfig, QdrantConfig};
use serde::{Deserialize, Serialize};
use vaultqa_core::{Result, VaultQaError};

/// One configured vault root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub name: String,
    pub path: String,
}

/// Metadata store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub db_path: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            db_path: "vaultqa.db".to_string(),
        }
    }
}

/// Main configuration structure for the vault-qa service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingClientConfig,
    #[serde(default)]
    pub chat: ChatClientConfig,
    #[serde(default)]
    pub vaults: Vec<VaultConfig>,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub batching: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VaultQaError::configuration(format!("cannot read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| VaultQaError::configuration(format!("invalid config file: {}", e)))
    }

    /// Build configuration from environment variables over defaults.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("VAULTQA_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("VAULTQA_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("VAULTQA_DB_PATH") {
            config.metadata.db_path = path;
        }
        if let Ok(url) = std::env::var("VAULTQA_QDRANT_URL") {
            config.qdrant.url = url;
        }
        if let Ok(name) = std::env::var("VAULTQA_COLLECTION") {
            config.qdrant.collection_name = name;
        }
        if let Ok(key) = std::env::var("VAULTQA_QDRANT_API_KEY") {
            config.qdrant.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("VAULTQA_EMBEDDING_URL") {
            config.embedding.url = url;
        }
        if let Ok(model) = std::env::var("VAULTQA_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(dim) = std::env::var("VAULTQA_EMBEDDING_DIMENSION") {
            if let Ok(dim) = dim.parse() {
                config.embedding.dimension = dim;
            }
        }
        if let Ok(key) = std::env::var("VAULTQA_EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("VAULTQA_CHAT_URL") {
            config.chat.url = url;
        }
        if let Ok(model) = std::env::var("VAULTQA_CHAT_MODEL") {
            config.chat.model = model;
        }
        if let Ok(key) = std::env::var("VAULTQA_CHAT_API_KEY") {
            config.chat.api_key = Some(key);
        }
        if let Ok(vaults) = std::env::var("VAULTQA_VAULTS") {
            config.vaults = parse_vault_list(&vaults);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.vaults.is_empty() {
            return Err(VaultQaError::configuration(
                "at least one vault must be configured",
            ));
        }
        let mut names: Vec<&str> = self.vaults.iter().map(|v| v.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.vaults.len() {
            return Err(VaultQaError::configuration("vault names must be unique"));
        }
        for vault in &self.vaults {
            if vault.name.trim().is_empty() || vault.path.trim().is_empty() {
                return Err(VaultQaError::configuration(
                    "vault name and path must be non-empty",
                ));
            }
        }
        if self.embedding.dimension == 0 {
            return Err(VaultQaError::configuration(
                "embedding dimension must be positive",
            ));
        }
        if self.chunking.min_chunk_size == 0
            || self.chunking.min_chunk_size >= self.chunking.max_chunk_size
        {
            return Err(VaultQaError::configuration(
                "chunk size bounds must satisfy 0 < min < max",
            ));
        }
        if self.qdrant.collection_name.trim().is_empty() {
            return Err(VaultQaError::configuration(
                "vector collection name must be non-empty",
            ));
        }
        if self.batching.max_batch_len == 0 || self.batching.max_batch_chars == 0 {
            return Err(VaultQaError::configuration(
                "embedding batch bounds must be positive",
            ));
        }
        Ok(())
    }

    /// Example environment variables for `--env-example`.
    pub fn env_example() -> String {
        r#"# vault-qa environment configuration
VAULTQA_HOST=0.0.0.0
VAULTQA_PORT=8080
VAULTQA_DB_PATH=/var/lib/vaultqa/vaultqa.db
VAULTQA_QDRANT_URL=http://localhost:6333
VAULTQA_COLLECTION=vaultqa_chunks
VAULTQA_EMBEDDING_URL=http://localhost:11434
VAULTQA_EMBEDDING_MODEL=nomic-embed-text
VAULTQA_EMBEDDING_DIMENSION=768
VAULTQA_CHAT_URL=http://localhost:11434
VAULTQA_CHAT_MODEL=llama3.1
# Vaults: name=path pairs separated by semicolons
VAULTQA_VAULTS=personal=/home/me/notes;work=/home/me/work-notes
"#
        .to_string()
    }
}

fn parse_vault_list(raw: &str) -> Vec<VaultConfig> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, path) = pair.split_once('=')?;
            let name = name.trim();
            let path = path.trim();
            if name.is_empty() || path.is_empty() {
                return None;
            }
            Some(VaultConfig {
                name: name.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}
