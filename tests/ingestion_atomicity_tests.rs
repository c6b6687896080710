//! Indexing atomicity (spec §8): after a failed ingestion, no
//! `document_chunks` rows exist for the failed document and no `documents`
//! row exists with that id. Exercises the same store/indexer components
//! `DocumentPipeline::process` wires together, driving the failure through
//! a dimension-mismatched embedding rather than a hand-crafted PDF payload.

use chrono::Utc;
use rag_backend::config::IngestionConfig;
use rag_backend::documents::indexer::VectorIndexer;
use rag_backend::documents::model::{ContentType, DocumentChunk};
use rag_backend::documents::store::DocumentStore;
use rag_backend::documents::vector_store::{SqliteVectorStore, VectorStore};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

const EMBEDDING_DIM: usize = 4;

fn make_chunk(document_id: i64, index: usize, embedding: Vec<f32>) -> DocumentChunk {
    DocumentChunk {
        id: 0,
        document_id,
        chunk_index: index,
        content: format!("chunk {index}"),
        embedding,
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
async fn fresh_ingestion_rolls_back_the_document_row_on_indexing_failure() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let document_store = Arc::new(DocumentStore::new(pool.clone()));
    document_store.init_schema().await.unwrap();

    let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool, EMBEDDING_DIM));
    let indexer = VectorIndexer::new(vector_store.clone(), &IngestionConfig::default());

    let document_id = document_store.create("report.pdf", "uploads/report.pdf").await.unwrap();

    // One well-formed chunk and one with the wrong embedding dimension: the
    // whole batch must fail together, per document-wide atomicity.
    let chunks = vec![
        make_chunk(document_id, 0, vec![1.0; EMBEDDING_DIM]),
        make_chunk(document_id, 1, vec![1.0; EMBEDDING_DIM + 1]),
    ];

    let index_result = indexer.index(document_id, &chunks).await;
    assert!(index_result.is_err());

    // Mirror pipeline.rs's rollback: a fresh ingestion deletes the document
    // row it just created when indexing fails.
    document_store.delete(document_id).await.unwrap();

    assert!(document_store.get(document_id).await.is_err());
    assert_eq!(vector_store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn reprocessing_replaces_chunks_for_the_same_document_id() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let document_store = Arc::new(DocumentStore::new(pool.clone()));
    document_store.init_schema().await.unwrap();

    let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool, EMBEDDING_DIM));
    let indexer = VectorIndexer::new(vector_store.clone(), &IngestionConfig::default());

    let document_id = document_store.create("report.pdf", "uploads/report.pdf").await.unwrap();

    let first_batch = vec![
        make_chunk(document_id, 0, vec![1.0; EMBEDDING_DIM]),
        make_chunk(document_id, 1, vec![0.5; EMBEDDING_DIM]),
        make_chunk(document_id, 2, vec![0.25; EMBEDDING_DIM]),
    ];
    indexer.index(document_id, &first_batch).await.unwrap();
    assert_eq!(vector_store.count().await.unwrap(), 3);

    // Reprocessing: delete the existing chunks, then insert the new batch.
    indexer.remove_document(document_id).await.unwrap();
    let second_batch = vec![make_chunk(document_id, 0, vec![1.0; EMBEDDING_DIM])];
    indexer.index(document_id, &second_batch).await.unwrap();

    assert_eq!(vector_store.count().await.unwrap(), second_batch.len());
}
