//! Index stage: chunk record fields, embed them, and upsert the vectors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{EmbeddingError, PipelineError};
use crate::models::{CatalogRecord, TextField, VectorMetadata, VectorRecord};
use crate::queue::{Consumer, Delivery};
use crate::services::{Embedder, VectorStore, chunk_by_sentences};

/// Consumer of [`CatalogRecord`] batches.
///
/// Fields are processed in the fixed [`TextField::ALL`] order; each populated
/// field is chunked and embedded with one call covering its whole chunk
/// sequence. A record is settled exactly once, after all its fields were
/// attempted: any field failure retries the whole record, but vectors from
/// fields that succeeded earlier still ride along in the batch upsert — the
/// deterministic ids make the eventual re-run overwrite them in place.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    max_sentences: usize,
    retry_delay: Duration,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        max_sentences: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            max_sentences: max_sentences.max(1),
            retry_delay,
        }
    }

    /// Build vectors for every populated field of one record, appending to
    /// the batch accumulator.
    async fn index_record(
        &self,
        record: &CatalogRecord,
        vectors: &mut Vec<VectorRecord>,
    ) -> Result<(), PipelineError> {
        for field in TextField::ALL {
            let Some(text) = record.field_text(field) else {
                continue;
            };

            let chunks = chunk_by_sentences(text, self.max_sentences);
            if chunks.is_empty() {
                continue;
            }

            let embeddings = self.embedder.embed_batch(chunks.clone()).await?;
            if embeddings.len() != chunks.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ))
                .into());
            }

            let total = chunks.len();
            for (index, (chunk, values)) in chunks.into_iter().zip(embeddings).enumerate() {
                vectors.push(VectorRecord {
                    id: VectorRecord::derive_id(record.id, field, index, total),
                    values,
                    metadata: VectorMetadata {
                        text: chunk,
                        source_id: record.id,
                        name: record.name.clone(),
                        url: record.url.clone(),
                        field,
                    },
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer<CatalogRecord> for Indexer {
    async fn consume(&self, batch: &mut [Delivery<CatalogRecord>]) {
        let mut vectors = Vec::new();

        for msg in batch.iter_mut() {
            match self.index_record(&msg.body, &mut vectors).await {
                Ok(()) => msg.ack(),
                Err(err) => {
                    warn!(
                        source_id = msg.body.id,
                        attempt = msg.attempt(),
                        %err,
                        "record failed, scheduling retry"
                    );
                    msg.retry_after(self.retry_delay);
                }
            }
        }

        if vectors.is_empty() {
            return;
        }

        // One upsert per consumed batch, not one per record.
        match self.store.upsert(vectors).await {
            Ok(count) => debug!(count, "upserted vectors"),
            Err(err) => {
                warn!(%err, "batch upsert failed, retrying all records");
                for msg in batch.iter_mut() {
                    msg.retry_after(self.retry_delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VectorStoreError;
    use crate::models::QueryMatch;
    use crate::services::MemoryBackend;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Embeds each text as a one-hot-ish vector of its length; fails for
    /// texts containing a poison marker.
    struct FakeEmbedder {
        calls: AtomicU32,
        poison: Option<&'static str>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                poison: None,
            }
        }

        fn poisoned(marker: &'static str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                poison: Some(marker),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.poison
                && texts.iter().any(|t| t.contains(marker))
            {
                return Err(EmbeddingError::ServerError("status 503: down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    /// Store wrapper that counts upsert calls and can fail.
    struct CountingStore {
        inner: MemoryBackend,
        upserts: AtomicU32,
        fail: Mutex<bool>,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new("test"),
                upserts: AtomicU32::new(0),
                fail: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl VectorStore for CountingStore {
        async fn health_check(&self) -> Result<bool, VectorStoreError> {
            Ok(true)
        }

        async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn upsert(&self, records: Vec<VectorRecord>) -> Result<u64, VectorStoreError> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock().unwrap() {
                return Err(VectorStoreError::UpsertError("connection reset".to_string()));
            }
            self.inner.upsert(records).await
        }

        async fn query(
            &self,
            vector: Vec<f32>,
            limit: u64,
        ) -> Result<Vec<QueryMatch>, VectorStoreError> {
            self.inner.query(vector, limit).await
        }

        async fn count(&self) -> Result<u64, VectorStoreError> {
            self.inner.count().await
        }

        fn collection(&self) -> &str {
            self.inner.collection()
        }
    }

    fn record(id: i64, summary: Option<&str>, storyline: Option<&str>) -> CatalogRecord {
        CatalogRecord {
            id,
            name: format!("Game {id}"),
            summary: summary.map(String::from),
            storyline: storyline.map(String::from),
            url: format!("https://example.com/games/{id}"),
        }
    }

    fn indexer(embedder: FakeEmbedder, store: Arc<CountingStore>) -> Indexer {
        Indexer::new(Arc::new(embedder), store, 3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_absent_fields_are_skipped() {
        let store = Arc::new(CountingStore::new());
        let idx = indexer(FakeEmbedder::new(), Arc::clone(&store));

        let mut batch = vec![Delivery::new(record(1, None, None))];
        idx.consume(&mut batch).await;

        assert!(!batch[0].needs_retry());
        let ids: HashSet<String> = store
            .inner
            .snapshot()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, HashSet::from(["1:name".to_string()]));
    }

    #[tokio::test]
    async fn test_multi_chunk_field_ids_are_indexed() {
        let store = Arc::new(CountingStore::new());
        let idx = indexer(FakeEmbedder::new(), Arc::clone(&store));

        // Four sentences, window of three: two chunks.
        let summary = "One. Two. Three. Four.";
        let mut batch = vec![Delivery::new(record(7, Some(summary), None))];
        idx.consume(&mut batch).await;

        let ids: HashSet<String> = store
            .inner
            .snapshot()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(
            ids,
            HashSet::from([
                "7:name".to_string(),
                "7:summary[0]".to_string(),
                "7:summary[1]".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_one_embed_call_per_field() {
        let store = Arc::new(CountingStore::new());
        let embedder = Arc::new(FakeEmbedder::new());
        let idx = Indexer::new(
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            Arc::clone(&store) as Arc<dyn VectorStore>,
            3,
            Duration::from_millis(1),
        );

        let mut batch = vec![Delivery::new(record(
            3,
            Some("A. B. C. D. E. F. G."),
            Some("Long ago."),
        ))];
        idx.consume(&mut batch).await;

        // name + summary + storyline: one embedding call per field,
        // regardless of how many chunks the field produced.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_field_failure_retries_record_but_keeps_earlier_vectors() {
        let store = Arc::new(CountingStore::new());
        // Poison the summary text: name embeds fine, summary fails.
        let idx = indexer(FakeEmbedder::poisoned("POISON"), Arc::clone(&store));

        let mut batch = vec![
            Delivery::new(record(1, Some("Fine summary."), None)),
            Delivery::new(record(2, Some("POISON text."), None)),
        ];
        idx.consume(&mut batch).await;

        assert!(!batch[0].needs_retry());
        assert!(batch[1].needs_retry());

        // Record 2's name succeeded before its summary failed, so its name
        // vector still landed; its summary produced nothing.
        let ids: HashSet<String> = store
            .inner
            .snapshot()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert!(ids.contains("1:name"));
        assert!(ids.contains("1:summary"));
        assert!(ids.contains("2:name"));
        assert!(!ids.iter().any(|id| id.starts_with("2:summary")));
    }

    #[tokio::test]
    async fn test_single_upsert_per_batch() {
        let store = Arc::new(CountingStore::new());
        let idx = indexer(FakeEmbedder::new(), Arc::clone(&store));

        let mut batch = vec![
            Delivery::new(record(1, Some("A."), None)),
            Delivery::new(record(2, Some("B."), None)),
            Delivery::new(record(3, None, Some("C."))),
        ];
        idx.consume(&mut batch).await;

        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upsert_failure_retries_whole_batch() {
        let store = Arc::new(CountingStore::new());
        *store.fail.lock().unwrap() = true;
        let idx = indexer(FakeEmbedder::new(), Arc::clone(&store));

        let mut batch = vec![
            Delivery::new(record(1, Some("A."), None)),
            Delivery::new(record(2, Some("B."), None)),
        ];
        idx.consume(&mut batch).await;

        assert!(batch.iter().all(|d| d.needs_retry()));
        assert_eq!(store.inner.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let store = Arc::new(CountingStore::new());
        let idx = indexer(FakeEmbedder::new(), Arc::clone(&store));

        let rec = record(9, Some("Stable. Ids. Everywhere. Always."), None);

        let mut first = vec![Delivery::new(rec.clone())];
        idx.consume(&mut first).await;
        let before = store.inner.snapshot();

        let mut second = vec![Delivery::new(rec)];
        idx.consume(&mut second).await;
        let after = store.inner.snapshot();

        assert_eq!(before, after);
    }
}
