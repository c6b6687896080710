//! Wiremock-backed tests for the Ollama-compatible LLM client boundary
//! (§6 "LLM/embedding provider"), stubbing the HTTP API instead of
//! requiring a live Ollama server.

use rag_backend::config::LlmConfig;
use rag_backend::llm::{user_message, LlmClient, OllamaClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(base_url: &str) -> LlmConfig {
    let mut config = LlmConfig::default();
    config.ollama_url = base_url.to_string();
    config
}

#[tokio::test]
async fn generate_parses_a_stubbed_chat_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "RAG combines retrieval with generation."},
            "done": true,
            "done_reason": "stop",
            "eval_count": 12
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(config_for(&server.uri()));
    let response = client
        .generate(&[user_message("What is RAG?")])
        .await
        .unwrap();

    assert_eq!(response.text, "RAG combines retrieval with generation.");
    assert_eq!(response.tokens_used, Some(12));
}

#[tokio::test]
async fn generate_surfaces_a_failed_status_as_generation_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(config_for(&server.uri()));
    let result = client.generate(&[user_message("hello")]).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn embed_parses_a_stubbed_embedding_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.1, 0.2, 0.3, 0.4]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(config_for(&server.uri()));
    let response = client.embed("RAG combines retrieval with generation.").await.unwrap();

    assert_eq!(response.embedding, vec![0.1, 0.2, 0.3, 0.4]);
}
