use crate::local::resolve_locally;
use crate::resolver::Resolver;
use database::Database;
use keywatch_core::{CoreError, LinkCacheEntry, ResolveError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info};

// URLs longer than this are used to complete the current batch but are
// not worth a cache row.
const MAX_CACHED_URL_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Posts still waiting for resolution before this batch ran.
    pub pending: u64,
    /// Posts selected into this batch.
    pub batch: usize,
    /// Actual redirections resolved over the network this run.
    pub resolved: usize,
    /// Posts left for a future run because some link stayed unresolved.
    pub skipped: usize,
}

/// Batch job turning raw shortened links into their final destinations:
/// select unresolved posts, deduplicate their URLs against the cache,
/// resolve what remains, persist the new redirections, and patch every
/// post whose links are now fully known.
pub struct LinkResolutionEngine<R: Resolver> {
    db: Database,
    resolver: R,
    batch_size: u32,
    verbose: bool,
}

impl<R: Resolver> LinkResolutionEngine<R> {
    pub fn new(db: Database, resolver: R, batch_size: u32, verbose: bool) -> Self {
        Self {
            db,
            resolver,
            batch_size,
            verbose,
        }
    }

    /// Run one batch. Returns `None` when nothing is waiting, so callers
    /// can loop until the backlog is empty. Safe to re-run after an
    /// interruption: every write is idempotent.
    pub async fn run_batch(&self) -> Result<Option<ResolveReport>, CoreError> {
        let todo = self.db.find_unresolved(self.batch_size).await?;
        let pending = self.db.count_unresolved().await?;
        info!("RESOLVING LINKS: {} waiting", pending);
        if todo.is_empty() {
            return Ok(None);
        }

        // Distinct raw links across posts that have no resolution yet.
        let mut batch_urls: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for post in todo.iter().filter(|p| p.proper_links.is_none()) {
            for link in &post.links {
                if seen.insert(link.as_str()) {
                    batch_urls.push(link.clone());
                }
            }
        }

        let mut already_done: HashMap<String, String> = self
            .db
            .find_links_in(&batch_urls)
            .await?
            .into_iter()
            .map(|entry| (entry.link_id, entry.real))
            .collect();

        let mut urls_to_clear: Vec<String> = Vec::new();
        for url in &batch_urls {
            if already_done.contains_key(url) {
                continue;
            }
            if let Some(local) = resolve_locally(url) {
                already_done.insert(url.clone(), local);
                continue;
            }
            urls_to_clear.push(url.clone());
        }

        let mut resolved = 0usize;
        if !urls_to_clear.is_empty() {
            info!("  + {} urls to resolve", urls_to_clear.len());
            let mut links_to_save: Vec<LinkCacheEntry> = Vec::new();

            for resolution in self.resolver.resolve_all(urls_to_clear).await {
                let last = resolution.final_url().to_string();

                if let Some(err) = &resolution.error {
                    // A chain cut short by the hop limit still counts as
                    // resolved to the last URL reached.
                    if !matches!(err, ResolveError::TooManyRedirects { .. }) {
                        error!(
                            "ERROR on resolving {}: {} (last url: {})",
                            resolution.url, err, last
                        );
                        continue;
                    }
                }

                if self.verbose {
                    debug!("           {} -> {}", resolution.url, last);
                }

                if resolution.url.len() < MAX_CACHED_URL_LEN {
                    links_to_save.push(LinkCacheEntry {
                        link_id: resolution.url.clone(),
                        real: last.clone(),
                    });
                }
                if resolution.url != last {
                    resolved += 1;
                }
                already_done.insert(resolution.url, last);
            }

            info!("  + STORING {} REDIRECTIONS", links_to_save.len());
            self.db.insert_links(&links_to_save).await?;
        }

        // Propagate resolutions back into posts, one write per effective
        // identifier: a reshare and its original share resolution state.
        let mut skipped = 0usize;
        let mut ids_done_in_batch: HashSet<String> = HashSet::new();
        for post in &todo {
            if post.proper_links.is_some() {
                continue;
            }
            let effective_id = post.effective_id().to_string();
            if ids_done_in_batch.contains(&effective_id) {
                continue;
            }

            let mut proper_links = Vec::with_capacity(post.links.len());
            for link in &post.links {
                match already_done.get(link) {
                    Some(real) => proper_links.push(real.clone()),
                    None => break,
                }
            }
            if proper_links.len() != post.links.len() {
                skipped += 1;
                continue;
            }

            self.db.mark_resolved(&effective_id, &proper_links).await?;
            ids_done_in_batch.insert(effective_id);
        }

        info!(
            "  + UPDATED POSTS (batch: {}, resolved: {}, skipped: {})",
            todo.len(),
            resolved,
            skipped
        );

        Ok(Some(ResolveReport {
            pending,
            batch: todo.len(),
            resolved,
            skipped,
        }))
    }

    /// Drain the backlog batch by batch, stopping once a run selects
    /// nothing or every selected post was skipped (no forward progress
    /// until new cache entries appear).
    pub async fn run_to_completion(&self) -> Result<ResolveReport, CoreError> {
        let mut totals = ResolveReport::default();
        loop {
            match self.run_batch().await? {
                Some(report) => {
                    totals.pending = report.pending;
                    totals.batch += report.batch;
                    totals.resolved += report.resolved;
                    totals.skipped += report.skipped;
                    if report.skipped == report.batch {
                        return Ok(totals);
                    }
                }
                None => return Ok(totals),
            }
        }
    }
}
