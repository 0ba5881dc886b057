//! End-to-end sweep over a fake catalog, through both queue stages, into
//! the in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gamedex::catalog::CatalogSource;
use gamedex::error::{CatalogError, EmbeddingError};
use gamedex::models::{CatalogRecord, PipelineConfig};
use gamedex::pipeline::run_sweep;
use gamedex::services::{Embedder, MemoryBackend, VectorStore};

fn record(id: i64, summary: Option<&str>, storyline: Option<&str>) -> CatalogRecord {
    CatalogRecord {
        id,
        name: format!("Game {id}"),
        summary: summary.map(String::from),
        storyline: storyline.map(String::from),
        url: format!("https://example.com/games/{id}"),
    }
}

/// Catalog with fixed pages keyed by offset. Offsets listed in
/// `fail_once` return a server error on their first fetch only.
struct FakeCatalog {
    pages: Arc<HashMap<u64, Vec<CatalogRecord>>>,
    fail_once: Mutex<HashSet<u64>>,
    fetches: AtomicU32,
}

impl FakeCatalog {
    fn new(pages: Arc<HashMap<u64, Vec<CatalogRecord>>>) -> Self {
        Self {
            pages,
            fail_once: Mutex::new(HashSet::new()),
            fetches: AtomicU32::new(0),
        }
    }

    fn failing_once_at(pages: Arc<HashMap<u64, Vec<CatalogRecord>>>, offset: u64) -> Self {
        let catalog = Self::new(pages);
        catalog.fail_once.lock().unwrap().insert(offset);
        catalog
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_page(&self, offset: u64, _limit: u32) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_once.lock().unwrap().remove(&offset) {
            return Err(CatalogError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.pages.get(&offset).cloned().unwrap_or_default())
    }
}

/// Deterministic embedder: the vector depends only on the text.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let sum: u32 = t.bytes().map(u32::from).sum();
                vec![(sum % 97) as f32, t.len() as f32]
            })
            .collect())
    }
}

fn pages() -> Arc<HashMap<u64, Vec<CatalogRecord>>> {
    let mut pages = HashMap::new();
    pages.insert(
        0,
        vec![
            record(1, Some("A space trading sim. Vast and quiet."), None),
            record(2, None, Some("A kingdom falls. A heir rises. War begins. Peace follows.")),
        ],
    );
    pages.insert(500, vec![record(3, Some("Puzzle platformer."), None)]);
    // Offset 1000 past the end of the data: empty page.
    pages.insert(1000, Vec::new());
    Arc::new(pages)
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        sweep_start: 0,
        sweep_end: 1_000,
        page_limit: 500,
        gather_batch_size: 2,
        index_batch_size: 2,
        pace_secs: 0,
        retry_delay_secs: 0,
        max_attempts: 3,
        max_sentences: 3,
    }
}

fn expected_ids() -> HashSet<String> {
    HashSet::from([
        "1:name".to_string(),
        "1:summary".to_string(),
        "2:name".to_string(),
        "2:storyline[0]".to_string(),
        "2:storyline[1]".to_string(),
        "3:name".to_string(),
        "3:summary".to_string(),
    ])
}

#[tokio::test]
async fn test_sweep_indexes_every_page() {
    let store = Arc::new(MemoryBackend::new("test"));
    let config = test_config();

    let receipt = run_sweep(
        FakeCatalog::new(pages()),
        Arc::new(HashEmbedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        &config,
    )
    .await
    .expect("sweep");

    // Receipt names the first offset past the sweep end.
    assert_eq!(receipt.offset, 1_500);
    assert_eq!(receipt.limit, 500);

    let ids: HashSet<String> = store.snapshot().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, expected_ids());
}

#[tokio::test]
async fn test_sweep_recovers_from_transient_page_failure() {
    let store = Arc::new(MemoryBackend::new("test"));
    let config = test_config();

    let catalog = FakeCatalog::failing_once_at(pages(), 500);
    run_sweep(
        catalog,
        Arc::new(HashEmbedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        &config,
    )
    .await
    .expect("sweep");

    // The failed page was redelivered and its records still landed.
    let ids: HashSet<String> = store.snapshot().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, expected_ids());
}

#[tokio::test]
async fn test_repeated_sweep_is_idempotent() {
    let store = Arc::new(MemoryBackend::new("test"));
    let config = test_config();
    let shared = pages();

    run_sweep(
        FakeCatalog::new(Arc::clone(&shared)),
        Arc::new(HashEmbedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        &config,
    )
    .await
    .expect("first sweep");
    let before = store.snapshot();

    run_sweep(
        FakeCatalog::new(shared),
        Arc::new(HashEmbedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        &config,
    )
    .await
    .expect("second sweep");
    let after = store.snapshot();

    assert_eq!(before, after);
    assert_eq!(store.count().await.unwrap(), expected_ids().len() as u64);
}
