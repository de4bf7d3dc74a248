use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectedVia {
    Stream,
    Search,
}

impl CollectedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectedVia::Stream => "stream",
            CollectedVia::Search => "search",
        }
    }
}

impl std::str::FromStr for CollectedVia {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(CollectedVia::Stream),
            "search" => Ok(CollectedVia::Search),
            other => Err(format!("unknown collection source: {other}")),
        }
    }
}

/// An unprocessed payload as received from either source. Opaque to the
/// queue; only the normalization step looks inside.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub payload: serde_json::Value,
    pub collected_via: CollectedVia,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub author_id: Option<String>,
    pub text: String,
    pub like_count: i64,
    pub reshare_count: i64,
    pub links: Vec<String>,
    pub proper_links: Option<Vec<String>>,
    pub links_to_resolve: bool,
    /// Identifier of the original post when this record is a reshare.
    pub reshare_of: Option<String>,
    pub collected_via: CollectedVia,
}

impl Post {
    /// The original post's identifier for a reshare, else the post's own id.
    /// Link resolution state is shared across a reshare and its original.
    pub fn effective_id(&self) -> &str {
        self.reshare_of.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCacheEntry {
    pub link_id: String,
    pub real: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_post(id: &str, reshare_of: Option<&str>) -> Post {
        Post {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            author: "someone".to_string(),
            author_id: None,
            text: "hello".to_string(),
            like_count: 0,
            reshare_count: 0,
            links: vec![],
            proper_links: None,
            links_to_resolve: false,
            reshare_of: reshare_of.map(String::from),
            collected_via: CollectedVia::Stream,
        }
    }

    #[test]
    fn effective_id_is_own_id_for_originals() {
        let post = sample_post("42", None);
        assert_eq!(post.effective_id(), "42");
    }

    #[test]
    fn effective_id_is_original_id_for_reshares() {
        let post = sample_post("43", Some("42"));
        assert_eq!(post.effective_id(), "42");
    }
}
