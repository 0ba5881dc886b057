//! Pure utilities and external-capability clients.

mod batch;
mod chunker;
mod embedding;
mod vector_store;

pub use batch::into_batches;
pub use chunker::{DEFAULT_MAX_SENTENCES, chunk_by_sentences};
pub use embedding::{Embedder, EmbeddingClient, HealthResponse};
pub use vector_store::{
    DEFAULT_EMBEDDING_DIM, MemoryBackend, QdrantBackend, VectorStore, create_backend,
};
