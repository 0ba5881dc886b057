//! Domain models shared across the pipeline.

mod config;
mod record;
mod search;

pub use config::{
    CatalogConfig, Config, DEFAULT_CATALOG_URL, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_URL,
    DEFAULT_QDRANT_URL, EmbeddingConfig, PipelineConfig, SearchConfig, StoreDriver,
    VectorStoreConfig,
};
pub use record::{CatalogRecord, GatherUnit, TextField, VectorMetadata, VectorRecord};
pub use search::{OutputFormat, QueryMatch, QueryResults, SweepReceipt};
