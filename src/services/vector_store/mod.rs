//! Vector store abstraction layer.
//!
//! A trait-based abstraction over vector store backends (Qdrant for real
//! deployments, an in-memory map for tests and dry runs). All writes are
//! upserts keyed by the deterministic vector id, so concurrent writers are
//! commutative and redelivered work units converge instead of duplicating.

mod memory;
mod qdrant;

pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{QueryMatch, StoreDriver, VectorRecord, VectorStoreConfig};

/// Default embedding dimension (bge-large-class models produce 1024-dim vectors).
pub const DEFAULT_EMBEDDING_DIM: u64 = 1024;

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create the collection if it doesn't exist.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace vector records; returns the number upserted.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<u64, VectorStoreError>;

    /// Nearest-neighbor lookup with full metadata, in store order.
    async fn query(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Number of vectors currently stored.
    async fn count(&self) -> Result<u64, VectorStoreError>;

    /// Get the collection name.
    fn collection(&self) -> &str;
}

/// Create a vector store backend based on configuration.
pub fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        StoreDriver::Qdrant => {
            let backend = QdrantBackend::new(config, embedding_dim)?;
            Ok(Box::new(backend))
        }
        StoreDriver::Memory => Ok(Box::new(MemoryBackend::new(&config.collection))),
    }
}
