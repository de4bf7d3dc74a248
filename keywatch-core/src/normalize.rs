use crate::types::{CollectedVia, Post, RawRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Pure transform from raw source payloads to canonical posts. Must be
/// deterministic and side-effect-free; all I/O stays with the caller.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, batch: Vec<RawRecord>) -> Vec<Post>;
}

// Wire shape of one source record. Everything the source might omit is
// optional; unknown fields are ignored at this boundary rather than deep
// in business logic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub id_str: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<WireUser>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub reshare_count: i64,
    #[serde(default)]
    pub entities: Option<WireEntities>,
    #[serde(default)]
    pub reshared_status: Option<Box<WireRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireUser {
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub id_str: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireEntities {
    #[serde(default)]
    pub urls: Vec<WireUrl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireUrl {
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl WireRecord {
    fn record_id(&self) -> Option<String> {
        self.id_str
            .clone()
            .or_else(|| self.id.map(|id| id.to_string()))
    }

    fn links(&self) -> Vec<String> {
        self.entities
            .as_ref()
            .map(|entities| {
                entities
                    .urls
                    .iter()
                    .filter_map(|u| u.expanded_url.clone().or_else(|| u.url.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Default normalizer for the sources' JSON payloads. Malformed records
/// (no id, no text or no author) are dropped here; a reshare's embedded
/// original is emitted as its own post so both documents exist in storage.
#[derive(Debug, Clone, Default)]
pub struct JsonNormalizer;

impl JsonNormalizer {
    fn to_post(
        &self,
        record: &WireRecord,
        via: CollectedVia,
        reshare_of: Option<String>,
    ) -> Option<Post> {
        let id = record.record_id()?;
        let text = record.text.clone()?;
        let author = record.user.as_ref()?.screen_name.clone()?;
        let links = record.links();

        Some(Post {
            id,
            created_at: record.created_at.unwrap_or_else(Utc::now),
            author,
            author_id: record.user.as_ref().and_then(|u| u.id_str.clone()),
            text,
            like_count: record.like_count,
            reshare_count: record.reshare_count,
            links_to_resolve: !links.is_empty(),
            links,
            proper_links: None,
            reshare_of,
            collected_via: via,
        })
    }
}

impl Normalizer for JsonNormalizer {
    fn normalize(&self, batch: Vec<RawRecord>) -> Vec<Post> {
        let mut order: Vec<String> = Vec::new();
        let mut by_id: std::collections::HashMap<String, Post> = std::collections::HashMap::new();
        let mut dropped = 0usize;

        let mut keep = |post: Post| {
            if !by_id.contains_key(&post.id) {
                order.push(post.id.clone());
            }
            // Re-delivery within one batch keeps the freshest copy.
            by_id.insert(post.id.clone(), post);
        };

        for raw in batch {
            let record: WireRecord = match serde_json::from_value(raw.payload) {
                Ok(record) => record,
                Err(_) => {
                    dropped += 1;
                    continue;
                }
            };

            let original_id = record
                .reshared_status
                .as_ref()
                .and_then(|original| original.record_id());

            if let Some(original) = record.reshared_status.as_deref() {
                match self.to_post(original, raw.collected_via, None) {
                    Some(post) => keep(post),
                    None => dropped += 1,
                }
            }

            match self.to_post(&record, raw.collected_via, original_id) {
                Some(post) => keep(post),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("Dropped {} malformed records during normalization", dropped);
        }

        order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect()
    }
}
