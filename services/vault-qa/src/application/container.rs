//! Service container: wires the pipelines to their collaborators and
//! orchestrates the query and index flows.

use super::requests::*;
use crate::answer::{AnswerSynthesizer, ABSTAIN_ANSWER};
use crate::chunker::MarkdownChunker;
use crate::config::Config;
use crate::folder_selector::FolderSelector;
use crate::indexing::IndexingPipeline;
use crate::infrastructure::{
    HttpChatClient, HttpEmbeddingClient, QdrantRestStore, SqliteMetadataStore,
};
use crate::retrieval::{RetrievalEngine, RetrievalRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vaultqa_core::{traits::MetadataStore, Result, VaultQaError};
use vaultqa_llm::ChatCompleter;
use vaultqa_search::RetrievalPolicy;
use vaultqa_vector::{EmbeddingGenerator, VectorRepository};

pub struct ServiceContainer {
    pub config: Config,
    pub metadata: Arc<dyn MetadataStore>,
    pub vectors: Arc<dyn VectorRepository>,
    pub embedder: Arc<dyn EmbeddingGenerator>,
    pub chat: Arc<dyn ChatCompleter>,
    pub indexer: IndexingPipeline,
    pub engine: RetrievalEngine,
    pub synthesizer: AnswerSynthesizer,
}

impl ServiceContainer {
    /// Connect external services, migrate the metadata store, ensure the
    /// vector collection, and register configured vaults.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let metadata: Arc<dyn MetadataStore> =
            Arc::new(SqliteMetadataStore::open(&config.metadata.db_path)?);
        let vectors: Arc<dyn VectorRepository> =
            Arc::new(QdrantRestStore::new(config.qdrant.clone())?);

        let embedding_client = HttpEmbeddingClient::new(config.embedding.clone())?;
        embedding_client.probe_dimension().await?;
        let embedder: Arc<dyn EmbeddingGenerator> = Arc::new(embedding_client);

        vectors.ensure_collection(embedder.dimension()).await?;

        for vault in &config.vaults {
            let registered = metadata.vault_get_or_create(&vault.name, &vault.path)?;
            info!(vault = %registered.name, id = registered.id, "vault registered");
        }

        let chat: Arc<dyn ChatCompleter> = Arc::new(HttpChatClient::new(config.chat.clone())?);

        Ok(Self::assemble(config, metadata, vectors, embedder, chat))
    }

    /// Wire the pipelines from already-built collaborators. Used by `new`
    /// and by tests that substitute in-process fakes.
    pub fn assemble(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingGenerator>,
        chat: Arc<dyn ChatCompleter>,
    ) -> Self {
        let indexer = IndexingPipeline::new(
            metadata.clone(),
            vectors.clone(),
            embedder.clone(),
            MarkdownChunker::new(config.chunking.clone()),
            config.batching.clone(),
        );
        let engine = RetrievalEngine::new(
            metadata.clone(),
            vectors.clone(),
            embedder.clone(),
            FolderSelector::new(chat.clone()),
            RetrievalPolicy::default(),
        );
        let synthesizer = AnswerSynthesizer::new(chat.clone());

        Self {
            config,
            metadata,
            vectors,
            embedder,
            chat,
            indexer,
            engine,
            synthesizer,
        }
    }

    /// Answer one question: folder selection, retrieval, synthesis.
    pub async fn ask(
        &self,
        request: AskRequest,
        cancel: &CancellationToken,
    ) -> Result<AskResponse> {
        if request.question.trim().is_empty() {
            return Err(VaultQaError::invalid_input(
                "question",
                "must be non-empty",
            ));
        }

        let total_started = Instant::now();
        let retrieval_request = RetrievalRequest {
            question: request.question.clone(),
            vaults: request.vaults.clone(),
            folders: request.folders.clone(),
            k: request.k,
            detail: request.detail,
        };

        let retrieved = self.engine.retrieve(&retrieval_request, cancel).await?;

        if retrieved.outcome.is_abstained() {
            let debug = request.debug.then(|| DebugInfo {
                retrieved_chunks: Vec::new(),
                folder_selection: FolderSelectionDebug {
                    selected: retrieved.folder_selection.selected.clone(),
                    available: retrieved.folder_selection.available.clone(),
                },
                latency: LatencyDebug {
                    folder_selection_ms: retrieved.folder_selection_ms,
                    retrieval_ms: retrieved.retrieval_ms,
                    generation_ms: 0,
                    total_ms: total_started.elapsed().as_millis() as u64,
                },
            });
            return Ok(AskResponse {
                answer: ABSTAIN_ANSWER.to_string(),
                references: Vec::new(),
                abstained: Some(true),
                abstain_reason: retrieved.outcome.abstain_reason.clone(),
                debug,
            });
        }

        let generation_started = Instant::now();
        let synthesized = self
            .synthesizer
            .synthesize(&request.question, &retrieved.outcome.candidates, cancel)
            .await?;
        let generation_ms = generation_started.elapsed().as_millis() as u64;

        let debug = request.debug.then(|| DebugInfo {
            retrieved_chunks: retrieved.outcome.candidates.clone(),
            folder_selection: FolderSelectionDebug {
                selected: retrieved.folder_selection.selected.clone(),
                available: retrieved.folder_selection.available.clone(),
            },
            latency: LatencyDebug {
                folder_selection_ms: retrieved.folder_selection_ms,
                retrieval_ms: retrieved.retrieval_ms,
                generation_ms,
                total_ms: total_started.elapsed().as_millis() as u64,
            },
        });

        Ok(AskResponse {
            answer: synthesized.answer,
            references: synthesized.references,
            abstained: None,
            abstain_reason: None,
            debug,
        })
    }

    /// Run a bulk index; with `force`, clear everything first.
    pub async fn index(
        &self,
        request: IndexRequest,
        cancel: &CancellationToken,
    ) -> Result<IndexResponse> {
        if request.force {
            self.indexer.clear_all().await?;
        }
        let summary = self.indexer.index_all(cancel).await?;
        let status = if summary.has_errors() {
            "completed_with_errors"
        } else {
            "completed"
        };
        Ok(IndexResponse {
            status: status.to_string(),
            summary,
        })
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        Ok(StatusResponse {
            collection: self.config.qdrant.collection_name.clone(),
            notes: self.metadata.note_count()?,
            chunks: self.metadata.chunk_count()?,
            points: self.vectors.point_count().await.unwrap_or(0),
            vector_dimension: self.embedder.dimension(),
            embedding_model: self.embedder.model_name().to_string(),
            chat_model: self.chat.model_name().to_string(),
        })
    }

    /// Liveness check: the metadata store must answer; the vector store is
    /// reported but does not fail the check.
    pub async fn health(&self) -> Result<serde_json::Value> {
        let notes = self.metadata.note_count()?;
        let vector_ok = self.vectors.point_count().await.is_ok();
        Ok(serde_json::json!({
            "status": if vector_ok { "healthy" } else { "degraded" },
            "components": {
                "metadata_store": { "status": "healthy", "notes": notes },
                "vector_store": { "status": if vector_ok { "healthy" } else { "unreachable" } },
            }
        }))
    }
}
