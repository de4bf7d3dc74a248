use crate::queue::QueueSender;
use chrono::Utc;
use keywatch_core::{stream_track, CollectedVia, CoreError, KeywordSet};
use source_client::{IngestStats, StreamMessage, StreamSession, StreamSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Why a streaming session ended. All outcomes lead to a reconnect; the
/// collector itself never terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A timed keyword changed status; the filter must be rebuilt.
    KeywordBoundary,
    /// The source told us to go away.
    Disconnected,
    /// The source closed the stream without a control frame.
    Closed,
}

pub struct StreamCollector<S: StreamSource> {
    source: S,
    keywords: KeywordSet,
    queue: QueueSender,
    stats: Arc<IngestStats>,
    debug: bool,
}

impl<S: StreamSource> StreamCollector<S> {
    pub fn new(
        source: S,
        keywords: KeywordSet,
        queue: QueueSender,
        stats: Arc<IngestStats>,
        debug: bool,
    ) -> Self {
        Self {
            source,
            keywords,
            queue,
            stats,
            debug,
        }
    }

    pub async fn run(mut self) {
        loop {
            let started = Instant::now();
            info!("Starting stream track");

            match self.run_session().await {
                Ok(end) => {
                    if end == SessionEnd::KeywordBoundary {
                        info!("Reached time to update list of keywords");
                    }
                }
                Err(e) => {
                    warn!(
                        "Stream connection lost, reconnecting in {}s ({})",
                        RECONNECT_DELAY.as_secs(),
                        e
                    );
                }
            }

            if self.debug {
                debug!(
                    "Stream stayed alive for {:.2}h",
                    started.elapsed().as_secs_f64() / 3600.0
                );
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    /// One streaming session over the currently effective keyword set.
    /// Ends at the next timed-keyword boundary, on a control frame, or on
    /// a connection error.
    pub async fn run_session(&mut self) -> Result<SessionEnd, CoreError> {
        let now = Utc::now();
        let tracks: Vec<String> = self
            .keywords
            .effective_at(now)
            .iter()
            .map(|term| stream_track(term))
            .collect();
        let deadline = self
            .keywords
            .next_boundary(now)
            .and_then(|boundary| (boundary - now).to_std().ok());

        let mut session = self.source.open(&tracks).await?;

        let boundary_sleep = async move {
            match deadline {
                Some(wait) => sleep(wait).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(boundary_sleep);

        loop {
            tokio::select! {
                _ = &mut boundary_sleep => return Ok(SessionEnd::KeywordBoundary),
                message = session.next_message() => match message? {
                    Some(StreamMessage::Record(record)) => {
                        self.queue.push(record);
                        self.stats.record_enqueued(CollectedVia::Stream, 1);
                        if self.debug {
                            debug!("[stream] +1 record");
                        }
                    }
                    Some(StreamMessage::Disconnect(reason))
                    | Some(StreamMessage::Hangup(reason)) => {
                        warn!("Stream connection lost: {}", reason);
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(StreamMessage::Timeout) => continue,
                    Some(StreamMessage::Info(value)) => {
                        info!("Got special data: {}", value);
                    }
                    None => return Ok(SessionEnd::Closed),
                },
            }
        }
    }
}
