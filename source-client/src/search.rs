use crate::http::{check_status, map_request_error};
use crate::rate_limit::{RateLimitStatus, RateLimitWindow};
use async_trait::async_trait;
use keywatch_core::{CollectedVia, CoreError, RawRecord, SourceApiError, SourceConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait SearchSource: Send + Sync {
    /// One page of records matching `query`, bounded below by `since_id`
    /// (exclusive) and above by `max_id` (exclusive).
    async fn search(
        &self,
        query: &str,
        count: u32,
        since_id: Option<u64>,
        max_id: Option<u64>,
    ) -> Result<Vec<RawRecord>, CoreError>;

    /// Current quota state of the search endpoint.
    async fn rate_limit(&self) -> Result<RateLimitWindow, CoreError>;
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

pub struct HttpSearchSource {
    client: reqwest::Client,
    search_url: String,
    rate_limit_url: String,
    bearer_token: String,
}

impl HttpSearchSource {
    pub fn new(config: &SourceConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            rate_limit_url: config.rate_limit_url.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl SearchSource for HttpSearchSource {
    async fn search(
        &self,
        query: &str,
        count: u32,
        since_id: Option<u64>,
        max_id: Option<u64>,
    ) -> Result<Vec<RawRecord>, CoreError> {
        let count_str = count.to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("count", count_str),
            ("include_entities", "true".to_string()),
        ];
        if let Some(since) = since_id {
            params.push(("since_id", since.to_string()));
        }
        if let Some(max) = max_id {
            params.push(("max_id", max.to_string()));
        }

        let response = self
            .client
            .get(&self.search_url)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response)?;

        let page: SearchPage = response.json().await.map_err(|e| {
            CoreError::SourceApi(SourceApiError::InvalidResponse {
                details: format!("failed to decode search page: {e}"),
            })
        })?;

        debug!("[search] +{} records ({})", page.results.len(), query);
        Ok(page
            .results
            .into_iter()
            .map(|payload| RawRecord {
                payload,
                collected_via: CollectedVia::Search,
            })
            .collect())
    }

    async fn rate_limit(&self) -> Result<RateLimitWindow, CoreError> {
        let response = self
            .client
            .get(&self.rate_limit_url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response)?;

        let status: RateLimitStatus = response.json().await.map_err(|e| {
            CoreError::SourceApi(SourceApiError::InvalidResponse {
                details: format!("failed to decode rate limit status: {e}"),
            })
        })?;

        Ok(status.into())
    }
}
