//! Document ingestion: PDF extraction, chunking, vector indexing, the
//! pipeline that orchestrates them, and the event consumer that drives the
//! pipeline from object-store upload events (§4.1–§4.5).

pub mod chunker;
pub mod consumer;
pub mod extractor;
pub mod indexer;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod vector_store;

pub use model::{ContentBlock, ContentType, Document, DocumentChunk};
pub use pipeline::DocumentPipeline;
pub use store::DocumentStore;
pub use vector_store::{ScoredChunk, SqliteVectorStore, VectorStore};
