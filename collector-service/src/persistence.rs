use crate::queue::QueueReceiver;
use database::Database;
use keywatch_core::{Normalizer, RawRecord};
use source_client::IngestStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const IDLE_DELAY: Duration = Duration::from_secs(2);

/// Sole consumer of the raw-message queue: drains it fully each cycle,
/// normalizes the batch, and upserts every resulting document.
pub struct PersistenceWorker<N: Normalizer> {
    queue: QueueReceiver,
    db: Database,
    normalizer: N,
    stats: Arc<IngestStats>,
    debug: bool,
}

impl<N: Normalizer> PersistenceWorker<N> {
    pub fn new(
        queue: QueueReceiver,
        db: Database,
        normalizer: N,
        stats: Arc<IngestStats>,
        debug: bool,
    ) -> Self {
        Self {
            queue,
            db,
            normalizer,
            stats,
            debug,
        }
    }

    pub async fn run(mut self) {
        loop {
            let batch = self.queue.drain();
            if batch.is_empty() {
                if self.queue.is_closed() {
                    debug!("Raw message queue closed, persistence worker exiting");
                    return;
                }
                sleep(IDLE_DELAY).await;
                continue;
            }
            self.persist_batch(batch).await;
        }
    }

    /// Normalize and store one drained batch. A document that fails to
    /// persist is logged and skipped; the rest of the batch proceeds.
    pub async fn persist_batch(&self, batch: Vec<RawRecord>) -> usize {
        let posts = self.normalizer.normalize(batch);
        let mut saved = 0usize;

        for post in &posts {
            match self.db.upsert_post(post).await {
                Ok(()) => {
                    saved += 1;
                    self.stats.record_saved(1);
                }
                Err(e) => {
                    warn!("Failed to persist post {}: {}", post.id, e);
                    self.stats.record_save_failure();
                }
            }
        }

        if self.debug && saved > 0 {
            debug!("Saved {} posts", saved);
        }
        saved
    }
}
