//! Sweep computation and paced dispatch onto the gather queue.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::QueueError;
use crate::models::{GatherUnit, PipelineConfig, SweepReceipt};
use crate::queue::DispatchQueue;
use crate::services::into_batches;

/// Enumerate the full sweep `[start, end]` stepped by `limit`: one unit per
/// page, covering the range exactly with no gaps and no overlaps.
pub fn sweep_units(start: u64, end: u64, limit: u32) -> Vec<GatherUnit> {
    let limit = limit.max(1);
    let mut units = Vec::new();
    let mut offset = start;
    while offset <= end {
        units.push(GatherUnit { offset, limit });
        offset += u64::from(limit);
    }
    units
}

/// Dispatch the full sweep onto the gather queue in paced batches.
///
/// Batch `k` is delayed by `k` pace steps — a pure function of the local
/// batch counter — to throttle burst load on the rate-limited catalog API.
/// Returns the last computed step: the first offset past the sweep end.
pub fn seed(
    queue: &DispatchQueue<GatherUnit>,
    config: &PipelineConfig,
) -> Result<SweepReceipt, QueueError> {
    let units = sweep_units(config.sweep_start, config.sweep_end, config.page_limit);
    let next_offset = units
        .last()
        .map_or(config.sweep_start, |u| u.offset + u64::from(u.limit));

    let pace = Duration::from_secs(config.pace_secs);
    let batches = into_batches(units, config.gather_batch_size as usize);
    let total = batches.len();

    for (k, batch) in batches.into_iter().enumerate() {
        debug!(
            batch = k,
            size = batch.len(),
            first_offset = batch[0].offset,
            "dispatching gather batch"
        );
        queue.send_batch(batch, pace * k as u32)?;
    }

    info!(batches = total, next_offset, "sweep seeded");
    Ok(SweepReceipt {
        offset: next_offset,
        limit: config.page_limit,
    })
}
