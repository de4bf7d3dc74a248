use keywatch_core::CollectedVia;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared between the collectors and the persistence
/// worker, snapshotted for periodic progress logs.
#[derive(Debug, Default)]
pub struct IngestStats {
    stream_enqueued: AtomicU64,
    search_enqueued: AtomicU64,
    saved: AtomicU64,
    save_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSnapshot {
    pub stream_enqueued: u64,
    pub search_enqueued: u64,
    pub saved: u64,
    pub save_failures: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self, via: CollectedVia, count: u64) {
        match via {
            CollectedVia::Stream => self.stream_enqueued.fetch_add(count, Ordering::Relaxed),
            CollectedVia::Search => self.search_enqueued.fetch_add(count, Ordering::Relaxed),
        };
    }

    pub fn record_saved(&self, count: u64) {
        self.saved.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            stream_enqueued: self.stream_enqueued.load(Ordering::Relaxed),
            search_enqueued: self.search_enqueued.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}
