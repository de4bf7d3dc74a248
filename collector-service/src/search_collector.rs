use crate::queue::QueueSender;
use chrono::Utc;
use keywatch_core::{
    build_queries, CollectedVia, CoreError, ErrorExt, KeywordSet, SourceApiError,
};
use source_client::{IngestStats, QueryCursor, RateLimitWindow, SearchSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(2);

// Assumed quota when the introspection endpoint is unavailable.
const DEFAULT_QUOTA: u32 = 180;

pub struct SearchCollector<S: SearchSource> {
    source: S,
    keywords: KeywordSet,
    cursors: HashMap<String, QueryCursor>,
    window: RateLimitWindow,
    queue: QueueSender,
    stats: Arc<IngestStats>,
    page_size: u32,
    terms_per_query: usize,
    debug: bool,
}

impl<S: SearchSource> SearchCollector<S> {
    /// Fetch the initial quota state and build the collector. Rejected
    /// credentials are fatal; any other introspection failure degrades to
    /// an assumed full quota.
    pub async fn init(
        source: S,
        keywords: KeywordSet,
        queue: QueueSender,
        stats: Arc<IngestStats>,
        page_size: u32,
        terms_per_query: usize,
        debug: bool,
    ) -> Result<Self, CoreError> {
        let window = match source.rate_limit().await {
            Ok(window) => window,
            Err(CoreError::SourceApi(SourceApiError::Unauthorized)) => {
                return Err(CoreError::SourceApi(SourceApiError::Unauthorized));
            }
            Err(e) => {
                warn!("Could not get search rate limits, assuming full quota ({})", e);
                let mut fallback = RateLimitWindow::new(DEFAULT_QUOTA, DEFAULT_QUOTA, Utc::now());
                fallback.assume_reset();
                fallback
            }
        };

        Ok(Self {
            source,
            keywords,
            cursors: HashMap::new(),
            window,
            queue,
            stats,
            page_size,
            terms_per_query,
            debug,
        })
    }

    pub async fn run(mut self) {
        loop {
            self.poll_once().await;
        }
    }

    /// One polling cycle: refresh the quota window if its boundary has
    /// been crossed, stall while the budget is exhausted, otherwise walk
    /// every query's pages and spread the remaining budget with a sleep.
    pub async fn poll_once(&mut self) {
        let now = Utc::now();
        if self.window.needs_refresh(now) {
            match self.source.rate_limit().await {
                Ok(window) => self.window = window,
                Err(e) => {
                    warn!("Could not refresh search rate limits ({})", e);
                    self.window.assume_reset();
                }
            }
        }

        let queries = build_queries(
            &self.keywords.effective_at(now),
            self.terms_per_query,
        );
        let timegap = Duration::from_secs(1 + queries.len() as u64);

        if self.window.is_exhausted() {
            let stall = self.window.stall_sleep(timegap, now);
            warn!(
                "Stalling search queries with rate exceeded for the next {}s",
                stall.as_secs()
            );
            sleep(stall).await;
            return;
        }

        if self.debug {
            debug!(
                "Starting search queries with {} remaining calls for the next {}s",
                self.window.remaining,
                self.window.secs_to_reset(now)
            );
        }

        for query in &queries {
            let cursor = self.cursors.entry(query.clone()).or_default();
            cursor.begin_pass();

            while !self.window.is_exhausted() {
                let page = self
                    .source
                    .search(query, self.page_size, cursor.since_id(), cursor.max_id())
                    .await;

                match page {
                    Ok(records) => {
                        self.window.record_call();
                        if records.is_empty() {
                            break;
                        }
                        for record in records {
                            let Some(id) = record_id(&record.payload) else {
                                continue;
                            };
                            cursor.observe(id);
                            self.queue.push(record);
                            self.stats.record_enqueued(CollectedVia::Search, 1);
                        }
                    }
                    Err(CoreError::SourceApi(SourceApiError::RateLimitExceeded {
                        retry_after,
                    })) => {
                        // Our window drifted from the source's; trust the source.
                        warn!("Search rate limit hit early, backing off {}s", retry_after);
                        self.window.remaining = 0;
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        warn!(
                            "Search connection could not be established, retrying in {}s ({})",
                            TRANSIENT_RETRY_DELAY.as_secs(),
                            e
                        );
                        sleep(TRANSIENT_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        warn!("Search query failed, skipping until next pass ({})", e);
                        break;
                    }
                }
            }

            cursor.end_pass();
        }

        sleep(self.window.spread_sleep(timegap, Utc::now())).await;
    }
}

fn record_id(payload: &serde_json::Value) -> Option<u64> {
    if let Some(id_str) = payload.get("id_str").and_then(|v| v.as_str()) {
        return id_str.parse().ok();
    }
    payload.get("id").and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{raw_message_queue, QueueReceiver};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use keywatch_core::RawRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSearch {
        // Pages served in order across all search() calls.
        pages: Mutex<Vec<Vec<u64>>>,
        calls: AtomicUsize,
        call_log: Mutex<Vec<(Option<u64>, Option<u64>)>>,
        window: Mutex<RateLimitWindow>,
    }

    impl FakeSearch {
        fn new(pages: Vec<Vec<u64>>, window: RateLimitWindow) -> Self {
            Self {
                pages: Mutex::new(pages),
                calls: AtomicUsize::new(0),
                call_log: Mutex::new(Vec::new()),
                window: Mutex::new(window),
            }
        }
    }

    #[async_trait]
    impl SearchSource for FakeSearch {
        async fn search(
            &self,
            _query: &str,
            _count: u32,
            since_id: Option<u64>,
            max_id: Option<u64>,
        ) -> Result<Vec<RawRecord>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_log.lock().unwrap().push((since_id, max_id));

            let mut pages = self.pages.lock().unwrap();
            let ids = if pages.is_empty() {
                vec![]
            } else {
                pages.remove(0)
            };
            Ok(ids
                .into_iter()
                .map(|id| RawRecord {
                    payload: json!({"id": id, "text": "found"}),
                    collected_via: CollectedVia::Search,
                })
                .collect())
        }

        async fn rate_limit(&self) -> Result<RateLimitWindow, CoreError> {
            Ok(self.window.lock().unwrap().clone())
        }
    }

    fn keywords() -> KeywordSet {
        KeywordSet::new(vec!["rust".to_string()], vec![])
    }

    async fn collector(
        source: FakeSearch,
    ) -> (SearchCollector<FakeSearch>, QueueReceiver) {
        let (tx, rx) = raw_message_queue();
        let collector = SearchCollector::init(
            source,
            keywords(),
            tx,
            Arc::new(IngestStats::new()),
            100,
            3,
            false,
        )
        .await
        .unwrap();
        (collector, rx)
    }

    fn open_window(remaining: u32) -> RateLimitWindow {
        RateLimitWindow::new(180, remaining, Utc::now() + ChronoDuration::seconds(900))
    }

    #[tokio::test(start_paused = true)]
    async fn pagination_stops_on_the_empty_page() {
        let pages = vec![
            (1..=100).rev().collect::<Vec<u64>>(),
            (101..=200).rev().collect(),
            vec![],
        ];
        let source = FakeSearch::new(pages, open_window(180));
        let (mut collector, mut rx) = collector(source).await;

        collector.poll_once().await;

        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(rx.drain().len(), 200);
        // The next pass starts past the highest id seen anywhere.
        let cursor = collector.cursors.values().next().unwrap();
        assert_eq!(cursor.since_id(), Some(201));
    }

    #[tokio::test(start_paused = true)]
    async fn pages_walk_backward_with_max_id() {
        let pages = vec![vec![300, 250], vec![200, 150], vec![]];
        let source = FakeSearch::new(pages, open_window(180));
        let (mut collector, _rx) = collector(source).await;

        collector.poll_once().await;

        let log = collector.source.call_log.lock().unwrap().clone();
        assert_eq!(log[0], (None, None));
        assert_eq!(log[1], (None, Some(249)));
        assert_eq!(log[2], (None, Some(149)));
    }

    #[tokio::test(start_paused = true)]
    async fn since_id_applies_on_the_following_pass() {
        let pages = vec![vec![500], vec![], vec![600], vec![]];
        let source = FakeSearch::new(pages, open_window(180));
        let (mut collector, _rx) = collector(source).await;

        collector.poll_once().await;
        collector.poll_once().await;

        let log = collector.source.call_log.lock().unwrap().clone();
        // Second pass carries the promoted lower bound.
        assert_eq!(log[2].0, Some(501));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_stalls_until_reset() {
        let reset_in = ChronoDuration::seconds(5);
        let exhausted = RateLimitWindow::new(180, 0, Utc::now() + reset_in);
        let source = FakeSearch::new(vec![vec![1], vec![]], exhausted.clone());
        let (tx, _rx) = raw_message_queue();

        let mut collector = SearchCollector::init(
            source,
            keywords(),
            tx,
            Arc::new(IngestStats::new()),
            100,
            3,
            false,
        )
        .await
        .unwrap();
        collector.window = exhausted;

        let before = tokio::time::Instant::now();
        collector.poll_once().await;

        // Stalled through the reset without issuing any search call.
        assert!(before.elapsed() >= Duration::from_secs(5));
        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_consumes_budget_even_when_empty() {
        let source = FakeSearch::new(vec![vec![]], open_window(10));
        let (mut collector, _rx) = collector(source).await;

        collector.poll_once().await;

        assert_eq!(collector.window.remaining, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_ends_the_pass_mid_query() {
        // Plenty of pages, but only two calls of budget.
        let pages = (0u64..10)
            .map(|n| vec![1000 - n * 10])
            .collect::<Vec<_>>();
        let source = FakeSearch::new(pages, open_window(2));
        let (mut collector, _rx) = collector(source).await;

        collector.poll_once().await;

        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 2);
        assert!(collector.window.is_exhausted());
    }
}
