use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A tracked term that is only active inside its `[start, end)` windows.
#[derive(Debug, Clone, Deserialize)]
pub struct TimedKeyword {
    pub term: String,
    pub windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl TimedKeyword {
    pub fn active_at(&self, at: DateTime<Utc>) -> bool {
        self.windows.iter().any(|(start, end)| *start <= at && at < *end)
    }

    /// The next instant after `at` when this keyword flips between active
    /// and inactive: the end of the window containing `at`, or the start of
    /// the nearest future window.
    pub fn next_boundary_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.windows
            .iter()
            .filter_map(|(start, end)| {
                if *start <= at && at < *end {
                    Some(*end)
                } else if *start > at {
                    Some(*start)
                } else {
                    None
                }
            })
            .min()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    pub permanent: Vec<String>,
    pub timed: Vec<TimedKeyword>,
}

impl KeywordSet {
    pub fn new(permanent: Vec<String>, timed: Vec<TimedKeyword>) -> Self {
        Self { permanent, timed }
    }

    /// Permanent keywords plus every timed keyword whose window covers `at`.
    pub fn effective_at(&self, at: DateTime<Utc>) -> Vec<String> {
        let mut terms = self.permanent.clone();
        for timed in &self.timed {
            if timed.active_at(at) {
                terms.push(timed.term.clone());
            }
        }
        terms
    }

    /// The earliest instant after `at` when any timed keyword changes
    /// status. A stream session is proactively ended at this time so the
    /// filter can be rebuilt.
    pub fn next_boundary(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.timed
            .iter()
            .filter_map(|timed| timed.next_boundary_after(at))
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.permanent.is_empty() && self.timed.is_empty()
    }
}

/// Normalize a term for the streaming filter list: author handles lose
/// their `@`, everything is trimmed and lowercased.
pub fn stream_track(term: &str) -> String {
    term.trim_start_matches('@').trim().to_lowercase()
}

/// Normalize a term for the search endpoint: `@handle` becomes an
/// author-scoped `from:` query, other terms pass through.
pub fn search_term(term: &str) -> String {
    match term.strip_prefix('@') {
        Some(handle) => format!("from:{handle}"),
        None => term.to_string(),
    }
}

/// OR-combine terms into query strings of at most `per_query` terms each,
/// respecting the endpoint's query-length limits.
pub fn build_queries(terms: &[String], per_query: usize) -> Vec<String> {
    terms
        .chunks(per_query.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|t| search_term(t))
                .collect::<Vec<_>>()
                .join(" OR ")
        })
        .collect()
}
