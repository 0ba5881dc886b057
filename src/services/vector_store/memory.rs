//! In-memory vector store backend for tests and dry runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{QueryMatch, VectorRecord};

/// Map-backed store keyed by the deterministic vector id, which makes upsert
/// a true replace by construction.
pub struct MemoryBackend {
    collection: String,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryBackend {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of all stored records, sorted by id for stable assertions.
    pub fn snapshot(&self) -> Vec<VectorRecord> {
        let mut records: Vec<VectorRecord> =
            self.records.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<u64, VectorStoreError> {
        let count = records.len() as u64;
        let mut map = self.records.write().unwrap();
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let map = self.records.read().unwrap();
        let mut matches: Vec<QueryMatch> = map
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(&vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        Ok(self.records.read().unwrap().len() as u64)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TextField, VectorMetadata};

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                text: format!("text for {id}"),
                source_id: 1,
                name: "Game".to_string(),
                url: "https://example.com/1".to_string(),
                field: TextField::Summary,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_not_appends() {
        let store = MemoryBackend::new("test");

        let first = vec![record("1:summary", vec![1.0, 0.0])];
        let again = vec![record("1:summary", vec![1.0, 0.0])];

        assert_eq!(store.upsert(first).await.unwrap(), 1);
        let before = store.snapshot();

        // A redelivered record must leave the store unchanged.
        assert_eq!(store.upsert(again).await.unwrap(), 1);
        let after = store.snapshot();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = MemoryBackend::new("test");
        store
            .upsert(vec![
                record("1:name", vec![1.0, 0.0]),
                record("2:name", vec![0.0, 1.0]),
                record("3:name", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let matches = store.query(vec![1.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "1:name");
        assert_eq!(matches[1].id, "3:name");
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn test_query_returns_full_metadata() {
        let store = MemoryBackend::new("test");
        store
            .upsert(vec![record("5:summary", vec![0.5, 0.5])])
            .await
            .unwrap();

        let matches = store.query(vec![0.5, 0.5], 10).await.unwrap();
        assert_eq!(matches[0].metadata.source_id, 1);
        assert_eq!(matches[0].metadata.field, TextField::Summary);
        assert!(!matches[0].metadata.text.is_empty());
    }
}
