//! Node 4: Retriever — multi-query vector similarity search over the
//! indexed corpus (§4.6).
//!
//! Errors here never fail the graph: a vector-store or embedding failure is
//! logged and yields an empty result, so ContextBuilder can report "no
//! context found" instead of aborting the run.

use crate::agent::graph::GraphContext;
use crate::agent::state::{AgentState, TOP_K_PER_STATEMENT};
use std::collections::HashSet;
use tracing::warn;

pub async fn run(ctx: &GraphContext, state: &mut AgentState) {
    state.retrieved_chunks = retrieve(ctx, &state.paraphrased_statements).await;
}

async fn retrieve(ctx: &GraphContext, statements: &[String]) -> Vec<String> {
    let mut seen_ids: HashSet<i64> = HashSet::new();
    let mut chunks = Vec::new();

    for statement in statements {
        let embedding = match ctx.llm.embed(statement).await {
            Ok(response) => response.embedding,
            Err(e) => {
                warn!(error = %e, "embedding failed for paraphrased statement, skipping");
                continue;
            }
        };

        let results = match ctx.vector_store.search(&embedding, TOP_K_PER_STATEMENT).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "vector search failed for paraphrased statement, skipping");
                continue;
            }
        };

        for scored in results {
            if seen_ids.insert(scored.chunk.id) {
                chunks.push(scored.chunk.content);
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::graph::GraphContext;
    use crate::chat::store::ChatStore;
    use crate::config::{ChatConfig, IngestionConfig, SafetyConfig};
    use crate::documents::model::{ContentType, DocumentChunk};
    use crate::documents::vector_store::SqliteVectorStore;
    use crate::documents::vector_store::VectorStore;
    use crate::llm::OllamaClient;
    use chrono::Utc;
    use proptest::prelude::*;
    use sqlx::sqlite::SqlitePool;
    use std::sync::Arc;

    async fn seeded_ctx() -> GraphContext {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let chat_store = Arc::new(ChatStore::new(pool.clone()));
        chat_store.init_schema().await.unwrap();

        crate::documents::store::DocumentStore::new(pool.clone())
            .init_schema()
            .await
            .unwrap();

        let vector_store = Arc::new(SqliteVectorStore::new(pool.clone(), 4));
        let chunk = DocumentChunk {
            id: 0,
            document_id: 1,
            chunk_index: 0,
            content: "RAG combines retrieval with generation.".to_string(),
            embedding: vec![1.0, 0.0, 0.0, 0.0],
            content_type: ContentType::Text,
            is_atomic: false,
            page: 1,
            total_pages: 1,
            filename: "doc.pdf".to_string(),
            start_index: Some(0),
            merged_small_chunk: false,
            created_at: Utc::now(),
        };
        vector_store.add_chunks(1, &[chunk]).await.unwrap();

        let llm = Arc::new(OllamaClient::new(Default::default()));
        GraphContext::new(
            chat_store,
            vector_store,
            llm,
            &SafetyConfig::default(),
            ChatConfig::default(),
            IngestionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_statements_yield_empty_result() {
        let ctx = seeded_ctx().await;
        let chunks = retrieve(&ctx, &[]).await;
        assert!(chunks.is_empty());
    }

    /// A deterministic stub embedding: text maps to a fixed point on one of
    /// four axes by its first byte, so repeated or reordered statements
    /// reliably hit the same (or no) indexed chunk.
    struct DeterministicLlm;

    #[async_trait::async_trait]
    impl crate::llm::LlmClient for DeterministicLlm {
        async fn generate(&self, _messages: &[crate::llm::Message]) -> crate::error::Result<crate::llm::GenerationResponse> {
            unimplemented!("retriever only calls embed")
        }

        async fn embed(&self, text: &str) -> crate::error::Result<crate::llm::EmbeddingResponse> {
            let axis = text.bytes().next().unwrap_or(0) as usize % 4;
            let mut embedding = vec![0.0f32; 4];
            embedding[axis] = 1.0;
            Ok(crate::llm::EmbeddingResponse {
                embedding,
                model: "deterministic-stub".to_string(),
            })
        }

        async fn list_models(&self) -> crate::error::Result<Vec<String>> {
            Ok(vec!["deterministic-stub".to_string()])
        }

        async fn is_model_available(&self, _model: &str) -> crate::error::Result<bool> {
            Ok(true)
        }
    }

    async fn deterministic_ctx() -> GraphContext {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let chat_store = Arc::new(ChatStore::new(pool.clone()));
        chat_store.init_schema().await.unwrap();
        crate::documents::store::DocumentStore::new(pool.clone())
            .init_schema()
            .await
            .unwrap();

        let vector_store = Arc::new(SqliteVectorStore::new(pool.clone(), 4));
        let mut chunks = Vec::new();
        for axis in 0..4 {
            let mut embedding = vec![0.0f32; 4];
            embedding[axis] = 1.0;
            chunks.push(DocumentChunk {
                id: 0,
                document_id: 1,
                chunk_index: axis,
                content: format!("chunk for axis {axis}"),
                embedding,
                content_type: ContentType::Text,
                is_atomic: false,
                page: 1,
                total_pages: 1,
                filename: "doc.pdf".to_string(),
                start_index: Some(0),
                merged_small_chunk: false,
                created_at: Utc::now(),
            });
        }
        vector_store.add_chunks(1, &chunks).await.unwrap();

        GraphContext::new(
            chat_store,
            vector_store,
            Arc::new(DeterministicLlm),
            &SafetyConfig::default(),
            ChatConfig::default(),
            IngestionConfig::default(),
        )
    }

    proptest! {
        /// Idempotence: retrieving with the same statement list twice, or
        /// with duplicated/reordered statements that resolve to the same
        /// embeddings, yields the same deduplicated chunk set every time
        /// (§8, retriever idempotence property).
        #[test]
        fn prop_retrieve_is_idempotent(statements in prop::collection::vec("[a-d]{1,6}", 1..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let ctx = deterministic_ctx().await;

                let first = retrieve(&ctx, &statements).await;
                let second = retrieve(&ctx, &statements).await;
                prop_assert_eq!(&first, &second);

                let mut seen = std::collections::HashSet::new();
                for content in &first {
                    prop_assert!(seen.insert(content.clone()), "duplicate chunk in result: {content}");
                }
                Ok(())
            }).unwrap();
        }
    }
}
