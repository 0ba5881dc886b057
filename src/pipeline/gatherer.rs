//! Gather stage: fetch catalog pages and re-dispatch records for indexing.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::catalog::CatalogSource;
use crate::error::PipelineError;
use crate::models::{CatalogRecord, GatherUnit};
use crate::queue::{Consumer, Delivery, DispatchQueue};
use crate::services::into_batches;

/// Consumer of [`GatherUnit`]s: one catalog page fetch per unit, with
/// successful pages forwarded to the index queue in dispatch batches.
pub struct Gatherer<C> {
    catalog: C,
    index_queue: DispatchQueue<CatalogRecord>,
    index_batch_size: usize,
    retry_delay: Duration,
}

impl<C: CatalogSource> Gatherer<C> {
    pub fn new(
        catalog: C,
        index_queue: DispatchQueue<CatalogRecord>,
        index_batch_size: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            catalog,
            index_queue,
            index_batch_size: index_batch_size.max(1),
            retry_delay,
        }
    }

    /// Fetch one page and forward its records; returns how many were
    /// forwarded. An empty page means the sweep ran past the end of the
    /// data and there is nothing to forward.
    async fn gather(&self, unit: GatherUnit) -> Result<usize, PipelineError> {
        let records = self.catalog.fetch_page(unit.offset, unit.limit).await?;
        if records.is_empty() {
            debug!(offset = unit.offset, "empty catalog page");
            return Ok(0);
        }

        let total = records.len();
        for batch in into_batches(records, self.index_batch_size) {
            debug!(size = batch.len(), "dispatching records for indexing");
            self.index_queue.send_batch(batch, Duration::ZERO)?;
        }
        Ok(total)
    }
}

#[async_trait]
impl<C: CatalogSource> Consumer<GatherUnit> for Gatherer<C> {
    async fn consume(&self, batch: &mut [Delivery<GatherUnit>]) {
        for msg in batch.iter_mut() {
            let unit = msg.body;
            match self.gather(unit).await {
                Ok(count) => {
                    info!(offset = unit.offset, records = count, "gathered page");
                    msg.ack();
                }
                Err(err) => {
                    warn!(
                        offset = unit.offset,
                        attempt = msg.attempt(),
                        %err,
                        "gather failed, scheduling retry"
                    );
                    msg.retry_after(self.retry_delay);
                }
            }
        }
    }
}
