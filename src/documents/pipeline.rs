//! Document ingestion pipeline: object store → extract → chunk → embed →
//! index (§4.4)

use crate::config::IngestionConfig;
use crate::documents::chunker::Chunker;
use crate::documents::extractor::PdfExtractor;
use crate::documents::indexer::VectorIndexer;
use crate::documents::model::DocumentChunk;
use crate::documents::store::DocumentStore;
use crate::error::{DocumentError, Result};
use crate::llm::LlmClient;
use crate::object_store::ObjectStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Orchestrates the whole ingestion pipeline for one uploaded PDF.
pub struct DocumentPipeline {
    object_store: Arc<dyn ObjectStore>,
    document_store: Arc<DocumentStore>,
    indexer: Arc<VectorIndexer>,
    llm: Arc<dyn LlmClient>,
    extractor: PdfExtractor,
    chunker: Chunker,
}

impl DocumentPipeline {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        document_store: Arc<DocumentStore>,
        indexer: Arc<VectorIndexer>,
        llm: Arc<dyn LlmClient>,
        ingestion_config: IngestionConfig,
    ) -> Self {
        Self {
            object_store,
            document_store,
            indexer,
            llm,
            extractor: PdfExtractor::new(),
            chunker: Chunker::new(ingestion_config),
        }
    }

    /// Process an object-store key end to end, returning the document id.
    ///
    /// `reprocess_document_id`, when set, reuses an existing `Document` row
    /// and deletes its existing chunks before re-inserting — the contract
    /// that makes reprocessing a given document idempotent.
    pub async fn process(
        &self,
        object_name: &str,
        filename: &str,
        reprocess_document_id: Option<i64>,
    ) -> Result<i64> {
        info!(object_name, "starting document pipeline");

        // 1. Download the PDF from the object store.
        let bytes = self.object_store.get_object(object_name).await?;

        // 2. Extract text and atomic table blocks.
        let blocks = self.extractor.extract(&bytes, filename)?;

        // 3. Chunk the extracted content.
        let prepared = self.chunker.chunk(&blocks);
        if prepared.is_empty() {
            return Err(DocumentError::BadInput(format!("{filename} produced no chunks")).into());
        }

        // 4. Embed each chunk.
        let mut chunks = Vec::with_capacity(prepared.len());
        for (index, piece) in prepared.into_iter().enumerate() {
            let embedding = self
                .llm
                .embed(&piece.content)
                .await
                .map_err(|e| DocumentError::EmbeddingFailed(e.to_string()))?
                .embedding;

            chunks.push(DocumentChunk {
                id: 0,
                document_id: 0,
                chunk_index: index,
                content: piece.content,
                embedding,
                content_type: piece.content_type,
                is_atomic: piece.is_atomic,
                page: piece.page,
                total_pages: piece.total_pages,
                filename: filename.to_string(),
                start_index: piece.start_index,
                merged_small_chunk: piece.merged_small_chunk,
                created_at: Utc::now(),
            });
        }

        // 5. Create (or reuse) the document row. Reprocessing deletes the
        // existing chunk rows and vector entries before re-inserting.
        let document_id = match reprocess_document_id {
            Some(id) => {
                self.document_store.get(id).await?;
                self.indexer.remove_document(id).await?;
                id
            }
            None => self.document_store.create(filename, object_name).await?,
        };

        for chunk in &mut chunks {
            chunk.document_id = document_id;
        }

        // 6. Index the embedded chunks. A batch failure here aborts the
        // whole document: on a fresh ingestion we delete the document row
        // we just created so no orphan document survives without chunks.
        if let Err(e) = self.indexer.index(document_id, &chunks).await {
            error!(document_id, error = %e, "vector indexing failed, rolling back");
            if reprocess_document_id.is_none() {
                let _ = self.document_store.delete(document_id).await;
            }
            return Err(e);
        }

        info!(document_id, chunk_count = chunks.len(), "document pipeline complete");
        Ok(document_id)
    }
}

// Full end-to-end pipeline tests (object store → extract → chunk → embed →
// index, including the reprocess-by-document_id path) live in
// tests/ingestion_atomicity_tests.rs, where an in-memory object store, a
// mock LLM client and an in-memory SQLite pool are wired together.
