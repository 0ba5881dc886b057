//! In-process dispatch queues with at-least-once delivery.
//!
//! The two pipeline stages are decoupled by these queues: the seeder and the
//! gatherer dispatch work-unit batches (optionally delayed, for pacing), a
//! worker delivers them to a [`Consumer`] in bounded batches, and each
//! [`Delivery`] is settled exactly once — acked, retried after a delay with
//! the same body, or dead-lettered once the attempt cap is reached. Delivery
//! is at-least-once and unordered; consumers must tolerate redelivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::QueueError;

struct Envelope<T> {
    body: T,
    attempt: u32,
}

/// Tracks messages that were sent but not yet acked or dead-lettered.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    drained: Notify,
}

impl Pending {
    fn add(&self, n: usize) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    fn complete(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    fn is_drained(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }
}

/// How a consumer settled one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Ack,
    Retry(Duration),
}

/// One message handed to a [`Consumer`].
///
/// The disposition defaults to ack, mirroring a handler that completed
/// without error; consumers mark failures explicitly via [`Delivery::retry`]
/// or [`Delivery::retry_after`].
#[derive(Debug)]
pub struct Delivery<T> {
    pub body: T,
    attempt: u32,
    disposition: Disposition,
}

impl<T> Delivery<T> {
    /// Create a first-attempt delivery, for driving a [`Consumer`] directly.
    pub fn new(body: T) -> Self {
        Self {
            body,
            attempt: 1,
            disposition: Disposition::Ack,
        }
    }

    /// 1-based delivery attempt for this message.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the delivery is currently marked for retry.
    pub fn needs_retry(&self) -> bool {
        matches!(self.disposition, Disposition::Retry(_))
    }

    pub fn ack(&mut self) {
        self.disposition = Disposition::Ack;
    }

    pub fn retry(&mut self) {
        self.disposition = Disposition::Retry(Duration::ZERO);
    }

    pub fn retry_after(&mut self, delay: Duration) {
        self.disposition = Disposition::Retry(delay);
    }
}

/// Batch-oriented message handler for one queue.
#[async_trait]
pub trait Consumer<T>: Send + Sync {
    /// Process one delivered batch, marking each delivery's disposition.
    async fn consume(&self, batch: &mut [Delivery<T>]);
}

/// Producer handle for a dispatch queue.
pub struct DispatchQueue<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Envelope<T>>,
    pending: Arc<Pending>,
}

// Manual impl: cloning the handle must not require T: Clone.
impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T: Send + 'static> DispatchQueue<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Dispatch a batch of bodies, delivered after `delay`.
    ///
    /// Delayed batches count as pending immediately, so [`join`](Self::join)
    /// cannot observe a drained queue while a paced batch is still sleeping.
    pub fn send_batch(&self, bodies: Vec<T>, delay: Duration) -> Result<(), QueueError> {
        if bodies.is_empty() {
            return Ok(());
        }
        self.pending.add(bodies.len());

        if delay.is_zero() {
            let mut closed = false;
            for body in bodies {
                if closed {
                    self.pending.complete();
                    continue;
                }
                if self.tx.send(Envelope { body, attempt: 1 }).is_err() {
                    self.pending.complete();
                    closed = true;
                }
            }
            if closed {
                return Err(QueueError::Closed(self.name));
            }
            return Ok(());
        }

        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);
        let name = self.name;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for body in bodies {
                if tx.send(Envelope { body, attempt: 1 }).is_err() {
                    debug!(queue = name, "queue closed, dropping delayed dispatch");
                    pending.complete();
                }
            }
        });
        Ok(())
    }

    /// Wait until every dispatched message has been acked or dead-lettered.
    pub async fn join(&self) {
        loop {
            let drained = self.pending.drained.notified();
            if self.pending.is_drained() {
                return;
            }
            drained.await;
        }
    }
}

/// Consumer side of a dispatch queue; drives a [`Consumer`] until the last
/// producer handle is dropped and the channel drains.
pub struct QueueWorker<T> {
    name: &'static str,
    rx: mpsc::UnboundedReceiver<Envelope<T>>,
    // Weak so an idle worker does not keep its own channel open.
    retry_tx: mpsc::WeakUnboundedSender<Envelope<T>>,
    pending: Arc<Pending>,
    max_attempts: u32,
    batch_size: usize,
}

impl<T: Send + std::fmt::Debug + 'static> QueueWorker<T> {
    pub async fn run<C: Consumer<T>>(mut self, consumer: C) {
        loop {
            let mut envelopes = Vec::with_capacity(self.batch_size);
            let received = self.rx.recv_many(&mut envelopes, self.batch_size).await;
            if received == 0 {
                debug!(queue = self.name, "queue closed, worker stopping");
                return;
            }

            let mut batch: Vec<Delivery<T>> = envelopes
                .into_iter()
                .map(|e| Delivery {
                    body: e.body,
                    attempt: e.attempt,
                    disposition: Disposition::Ack,
                })
                .collect();

            consumer.consume(&mut batch).await;

            for delivery in batch {
                self.settle(delivery);
            }
        }
    }

    fn settle(&self, delivery: Delivery<T>) {
        let delay = match delivery.disposition {
            Disposition::Ack => {
                self.pending.complete();
                return;
            }
            Disposition::Retry(delay) => delay,
        };

        if delivery.attempt >= self.max_attempts {
            warn!(
                queue = self.name,
                attempts = delivery.attempt,
                body = ?delivery.body,
                "dead-lettering message after max attempts"
            );
            self.pending.complete();
            return;
        }

        let envelope = Envelope {
            body: delivery.body,
            attempt: delivery.attempt + 1,
        };
        let retry_tx = self.retry_tx.clone();
        let pending = Arc::clone(&self.pending);
        let name = self.name;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let delivered = retry_tx
                .upgrade()
                .is_some_and(|tx| tx.send(envelope).is_ok());
            if !delivered {
                debug!(queue = name, "queue closed, dropping retry");
                pending.complete();
            }
        });
    }
}

/// Create a dispatch queue delivering batches of at most `batch_size`
/// messages, dead-lettering after `max_attempts` delivery attempts.
pub fn dispatch_queue<T: Send + 'static>(
    name: &'static str,
    max_attempts: u32,
    batch_size: usize,
) -> (DispatchQueue<T>, QueueWorker<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(Pending::default());
    let worker = QueueWorker {
        name,
        rx,
        retry_tx: tx.downgrade(),
        pending: Arc::clone(&pending),
        max_attempts: max_attempts.max(1),
        batch_size: batch_size.max(1),
    };
    let queue = DispatchQueue { name, tx, pending };
    (queue, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
        fail_until_attempt: u32,
    }

    #[async_trait]
    impl Consumer<u32> for Recording {
        async fn consume(&self, batch: &mut [Delivery<u32>]) {
            for msg in batch.iter_mut() {
                self.seen.lock().unwrap().push((msg.body, msg.attempt()));
                if msg.attempt() < self.fail_until_attempt {
                    msg.retry();
                } else {
                    msg.ack();
                }
            }
        }
    }

    #[tokio::test]
    async fn test_ack_drains_queue() {
        let (queue, worker) = dispatch_queue::<u32>("test", 3, 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(worker.run(Recording {
            seen: Arc::clone(&seen),
            fail_until_attempt: 1,
        }));

        queue
            .send_batch(vec![1, 2, 3], Duration::ZERO)
            .expect("send");
        queue.join().await;

        let bodies: Vec<u32> = seen.lock().unwrap().iter().map(|(b, _)| *b).collect();
        assert_eq!(bodies, vec![1, 2, 3]);

        drop(queue);
        handle.await.expect("worker");
    }

    #[tokio::test]
    async fn test_retry_redelivers_same_body() {
        let (queue, worker) = dispatch_queue::<u32>("test", 5, 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(worker.run(Recording {
            seen: Arc::clone(&seen),
            fail_until_attempt: 3,
        }));

        queue.send_batch(vec![7], Duration::ZERO).expect("send");
        queue.join().await;

        let attempts = seen.lock().unwrap().clone();
        assert_eq!(attempts, vec![(7, 1), (7, 2), (7, 3)]);

        drop(queue);
        handle.await.expect("worker");
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let (queue, worker) = dispatch_queue::<u32>("test", 2, 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(worker.run(Recording {
            seen: Arc::clone(&seen),
            // Never acks within the cap
            fail_until_attempt: u32::MAX,
        }));

        queue.send_batch(vec![9], Duration::ZERO).expect("send");
        queue.join().await;

        assert_eq!(seen.lock().unwrap().len(), 2);

        drop(queue);
        handle.await.expect("worker");
    }

    #[tokio::test]
    async fn test_delayed_batch_counts_as_pending() {
        let (queue, worker) = dispatch_queue::<u32>("test", 3, 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(worker.run(Recording {
            seen: Arc::clone(&seen),
            fail_until_attempt: 1,
        }));

        queue
            .send_batch(vec![1], Duration::from_millis(20))
            .expect("send");
        // join must wait through the pacing delay
        queue.join().await;
        assert_eq!(seen.lock().unwrap().len(), 1);

        drop(queue);
        handle.await.expect("worker");
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (queue, _worker) = dispatch_queue::<u32>("test", 3, 10);
        queue.send_batch(Vec::new(), Duration::ZERO).expect("send");
        queue.join().await;
    }

    #[tokio::test]
    async fn test_unset_disposition_defaults_to_ack() {
        struct Passive;

        #[async_trait]
        impl Consumer<u32> for Passive {
            async fn consume(&self, _batch: &mut [Delivery<u32>]) {}
        }

        let (queue, worker) = dispatch_queue::<u32>("test", 3, 10);
        let handle = tokio::spawn(worker.run(Passive));

        queue.send_batch(vec![1, 2], Duration::ZERO).expect("send");
        queue.join().await;

        drop(queue);
        handle.await.expect("worker");
    }
}
