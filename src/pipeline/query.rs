//! Read-side query path: embed the query text, look up nearest vectors.

use crate::error::SearchError;
use crate::models::QueryMatch;
use crate::services::{Embedder, VectorStore};

/// Embed `text` as a single chunk and return the store's nearest matches
/// with full metadata, in the order the store ranked them.
pub async fn run_query(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    text: &str,
    limit: u64,
) -> Result<Vec<QueryMatch>, SearchError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SearchError::InvalidQuery(
            "query text cannot be empty".to_string(),
        ));
    }

    let vector = embedder.embed_query(text).await?;
    let matches = store.query(vector, limit).await?;
    Ok(matches)
}
