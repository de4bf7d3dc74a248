use crate::error::{ConfigError, CoreError};
use crate::keywords::{KeywordSet, TimedKeyword};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub timed_keywords: Vec<TimedKeyword>,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub stream_url: String,
    pub search_url: String,
    pub rate_limit_url: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub page_size: u32,
    pub terms_per_query: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            terms_per_query: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub batch_size: u32,
    pub concurrency: usize,
    pub throttle_ms: u64,
    pub max_redirects: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            batch_size: 600,
            concurrency: 50,
            throttle_ms: 200,
            max_redirects: 20,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load and validate the configuration file. Called once at startup;
    /// any failure here is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| {
            CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        })?;
        let config: AppConfig = toml::from_str(&raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::new(self.keywords.clone(), self.timed_keywords.clone())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.keywords.is_empty() && self.timed_keywords.is_empty() {
            return Err(CoreError::Config(ConfigError::ValidationFailed {
                reason: "at least one keyword or timed keyword is required".to_string(),
            }));
        }
        if self.source.bearer_token.is_empty() {
            return Err(CoreError::Config(ConfigError::MissingField {
                field: "source.bearer_token".to_string(),
            }));
        }
        if self.collect.page_size == 0 {
            return Err(CoreError::Config(ConfigError::InvalidValue {
                field: "collect.page_size".to_string(),
                value: "0".to_string(),
            }));
        }
        if self.resolve.batch_size == 0 {
            return Err(CoreError::Config(ConfigError::InvalidValue {
                field: "resolve.batch_size".to_string(),
                value: "0".to_string(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = r#"
        debug = true
        keywords = ["rustlang", "@ferris"]

        [[timed_keywords]]
        term = "conference"
        windows = [["2026-03-01T10:00:00Z", "2026-03-01T10:30:00Z"]]

        [source]
        stream_url = "https://stream.example.com/filter"
        search_url = "https://api.example.com/search"
        rate_limit_url = "https://api.example.com/rate_limit"
        bearer_token = "secret"

        [storage]
        url = "sqlite::memory:"
    "#;

    #[test]
    fn parses_full_config_with_defaults() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert!(config.debug);
        assert_eq!(config.keywords.len(), 2);
        assert_eq!(config.collect.page_size, 100);
        assert_eq!(config.collect.terms_per_query, 3);
        assert_eq!(config.resolve.concurrency, 50);
        assert_eq!(config.resolve.max_redirects, 20);

        let timed = &config.timed_keywords[0];
        assert_eq!(timed.term, "conference");
        assert_eq!(
            timed.windows[0].0,
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_config_without_any_keywords() {
        let raw = r#"
            [source]
            stream_url = "https://stream.example.com/filter"
            search_url = "https://api.example.com/search"
            rate_limit_url = "https://api.example.com/rate_limit"
            bearer_token = "secret"

            [storage]
            url = "sqlite::memory:"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CoreError::Config(ConfigError::ValidationFailed { .. }))
        ));
    }

    #[test]
    fn rejects_empty_bearer_token() {
        let raw = SAMPLE.replace("\"secret\"", "\"\"");
        let config: AppConfig = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CoreError::Config(ConfigError::MissingField { .. }))
        ));
    }
}
