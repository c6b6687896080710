//! Vector indexer: batches embedded chunks into the vector store (§4.3)

use crate::config::IngestionConfig;
use crate::documents::model::DocumentChunk;
use crate::documents::vector_store::VectorStore;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Writes chunks to the vector store in batches of `batch_size`. A failure
/// partway through aborts the whole document: the caller is expected to
/// treat any error from `index` as "nothing was written" and roll the
/// enclosing document back (§4.3 document-wide atomicity).
pub struct VectorIndexer {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl VectorIndexer {
    pub fn new(store: Arc<dyn VectorStore>, config: &IngestionConfig) -> Self {
        Self {
            store,
            batch_size: config.batch_size.max(1),
        }
    }

    pub async fn index(&self, document_id: i64, chunks: &[DocumentChunk]) -> Result<()> {
        for batch in chunks.chunks(self.batch_size) {
            self.store.add_chunks(document_id, batch).await?;
        }
        info!(document_id, chunk_count = chunks.len(), "indexed document chunks");
        Ok(())
    }

    pub async fn remove_document(&self, document_id: i64) -> Result<()> {
        self.store.delete_by_document(document_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::model::ContentType;
    use crate::documents::vector_store::ScoredChunk;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingStore {
        batches: Mutex<Vec<usize>>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn add_chunks(&self, _document_id: i64, chunks: &[DocumentChunk]) -> Result<()> {
            let mut batches = self.batches.lock().unwrap();
            batches.push(chunks.len());
            if self.fail_on_batch == Some(batches.len()) {
                return Err(crate::error::DocumentError::IndexWriteFailed("boom".into()).into());
            }
            Ok(())
        }

        async fn delete_by_document(&self, _document_id: i64) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _query: &[f32], _limit: usize) -> Result<Vec<ScoredChunk>> {
            Ok(vec![])
        }

        async fn count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn make_chunk(i: usize) -> DocumentChunk {
        DocumentChunk {
            id: 0,
            document_id: 1,
            chunk_index: i,
            content: format!("chunk {i}"),
            embedding: vec![0.0; 4],
            content_type: ContentType::Text,
            is_atomic: false,
            page: 1,
            total_pages: 1,
            filename: "doc.pdf".to_string(),
            start_index: Some(0),
            merged_small_chunk: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let store = Arc::new(RecordingStore {
            batches: Mutex::new(vec![]),
            fail_on_batch: None,
        });
        let mut config = IngestionConfig::default();
        config.batch_size = 2;
        let indexer = VectorIndexer::new(store.clone(), &config);

        let chunks: Vec<_> = (0..5).map(make_chunk).collect();
        indexer.index(1, &chunks).await.unwrap();

        assert_eq!(*store.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let store = Arc::new(RecordingStore {
            batches: Mutex::new(vec![]),
            fail_on_batch: Some(2),
        });
        let mut config = IngestionConfig::default();
        config.batch_size = 2;
        let indexer = VectorIndexer::new(store, &config);

        let chunks: Vec<_> = (0..5).map(make_chunk).collect();
        assert!(indexer.index(1, &chunks).await.is_err());
    }
}
