//! Infrastructure adapters: persistence and external-service clients.

pub mod chat;
pub mod embeddings;
pub mod http;
pub mod metadata;
pub mod qdrant;

pub use chat::{ChatClientConfig, HttpChatClient};
pub use embeddings::{EmbeddingClientConfig, HttpEmbeddingClient};
pub use metadata::SqliteMetadataStore;
pub use qdrant::{QdrantConfig, QdrantRestStore};
