//! The two-stage ingestion pipeline.
//!
//! Control flow: seeder → gather queue → gatherer (catalog fetch) → index
//! queue → indexer → vector store. Stages coordinate only through the
//! queues; the vector store is the sole shared mutable resource, and all
//! writes to it are idempotent upserts, so stages and batches may run
//! concurrently without locking.

mod gatherer;
mod indexer;
mod query;
mod seeder;

pub use gatherer::Gatherer;
pub use indexer::Indexer;
pub use query::run_query;
pub use seeder::{seed, sweep_units};

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::catalog::CatalogSource;
use crate::error::PipelineError;
use crate::models::{CatalogRecord, GatherUnit, PipelineConfig, SweepReceipt};
use crate::queue::dispatch_queue;
use crate::services::{Embedder, VectorStore};

/// Run one full catalog sweep through both stages and wait for it to drain.
///
/// Returns once every dispatched work unit has been acked or dead-lettered;
/// the store then holds everything the sweep could index.
pub async fn run_sweep<C>(
    catalog: C,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: &PipelineConfig,
) -> Result<SweepReceipt, PipelineError>
where
    C: CatalogSource + 'static,
{
    let (gather_queue, gather_worker) = dispatch_queue::<GatherUnit>(
        "gather",
        config.max_attempts,
        config.gather_batch_size as usize,
    );
    let (index_queue, index_worker) = dispatch_queue::<CatalogRecord>(
        "index",
        config.max_attempts,
        config.index_batch_size as usize,
    );

    let retry_delay = Duration::from_secs(config.retry_delay_secs);
    let gatherer = Gatherer::new(
        catalog,
        index_queue.clone(),
        config.index_batch_size as usize,
        retry_delay,
    );
    let indexer = Indexer::new(embedder, store, config.max_sentences as usize, retry_delay);

    let gather_handle = tokio::spawn(gather_worker.run(gatherer));
    let index_handle = tokio::spawn(index_worker.run(indexer));

    let receipt = seed(&gather_queue, config)?;

    // Gather drains first; every index dispatch happens before its gather
    // unit acks, so the index queue sees no new work after this point.
    gather_queue.join().await;
    index_queue.join().await;

    drop(gather_queue);
    if let Err(err) = gather_handle.await {
        warn!(%err, "gather worker task failed");
    }
    drop(index_queue);
    if let Err(err) = index_handle.await {
        warn!(%err, "index worker task failed");
    }

    Ok(receipt)
}
