//! Error handling for the RAG backend

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error type. Each variant maps to one of the error kinds named
/// in the error handling design: bad input, external dependency, policy
/// violation, invariant violation.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("chat store error: {0}")]
    Chat(#[from] ChatError),

    #[error("agent graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors from the PDF extractor, chunker, vector indexer, and document
/// pipeline. A "bad input" variant corresponds to the error handling
/// design's same-named category; the others correspond to "external
/// dependency" or "invariant violation".
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider failed: {0}")]
    EmbeddingFailed(String),

    #[error("vector index write failed: {0}")]
    IndexWriteFailed(String),

    #[error("document not found: {0}")]
    NotFound(i64),

    #[error("object store failed: {0}")]
    ObjectStoreFailed(String),
}

/// Errors from chat session/message persistence.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("not found or access denied")]
    NotFoundOrAccessDenied,

    #[error("empty owner id")]
    EmptyOwner,

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}

/// Errors surfaced by the agent graph's node execution. These are recorded
/// on `AgentState::error_message` rather than propagated, but the type
/// exists so nodes and the pipeline share one vocabulary.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("input flagged malicious: {0}")]
    InputMalicious(String),

    #[error("output flagged risky: {0}")]
    OutputRisky(String),

    #[error("session ownership violation")]
    OwnershipViolation,

    #[error("missing required state after {node}: {field}")]
    MissingState { node: &'static str, field: &'static str },

    #[error("validator failed: {0}")]
    ValidatorFailed(String),
}

/// Errors related to language model / embedding provider operations.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout: operation took too long")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Whether the error is worth retrying (transient external dependency
    /// failure) as opposed to a permanent / bad-input failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Llm(LlmError::Timeout)
                | AppError::Llm(LlmError::ConnectionFailed(_))
                | AppError::Http(_)
                | AppError::ObjectStore(_)
                | AppError::Broker(_)
        )
    }

    /// Error category for logging/metrics, matching the error handling
    /// design's taxonomy (bad input / external dependency / policy
    /// violation / invariant violation).
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Document(DocumentError::BadInput(_)) => "bad_input",
            AppError::Document(_) => "external_dependency",
            AppError::Chat(ChatError::NotFoundOrAccessDenied) => "policy_violation",
            AppError::Chat(_) => "external_dependency",
            AppError::Graph(GraphError::InputMalicious(_))
            | AppError::Graph(GraphError::OutputRisky(_))
            | AppError::Graph(GraphError::OwnershipViolation) => "policy_violation",
            AppError::Graph(_) => "invariant_violation",
            AppError::Llm(_) => "external_dependency",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
            AppError::Http(_) => "external_dependency",
            AppError::Database(_) => "external_dependency",
            AppError::ObjectStore(_) => "external_dependency",
            AppError::Broker(_) => "external_dependency",
            AppError::Generic(_) => "generic",
            AppError::NotFound(_) => "not_found",
        }
    }
}
