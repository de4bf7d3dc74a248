use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use keywatch_core::{CoreError, ResolveConfig, ResolveError};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct Hop {
    pub url: String,
    pub status: u16,
}

/// Outcome of resolving one URL: the redirect chain actually followed and
/// an optional error classification. The final URL is the last hop
/// reached, whether or not the chain completed.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub url: String,
    pub stack: Vec<Hop>,
    pub error: Option<ResolveError>,
}

impl Resolution {
    pub fn final_url(&self) -> &str {
        self.stack.last().map(|hop| hop.url.as_str()).unwrap_or(&self.url)
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve every URL with bounded parallelism. Always yields one
    /// `Resolution` per input URL, in no particular order.
    async fn resolve_all(&self, urls: Vec<String>) -> Vec<Resolution>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for std::sync::Arc<R> {
    async fn resolve_all(&self, urls: Vec<String>) -> Vec<Resolution> {
        (**self).resolve_all(urls).await
    }
}

pub struct HttpResolver {
    client: reqwest::Client,
    concurrency: usize,
    throttle: Duration,
    max_redirects: u32,
}

impl HttpResolver {
    pub fn new(config: &ResolveConfig) -> Result<Self, CoreError> {
        // Redirects are walked by hand so every hop lands in the chain.
        // Certificate errors are tolerated: a link behind a bad cert still
        // has a destination worth recording.
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            client,
            concurrency: config.concurrency.max(1),
            throttle: Duration::from_millis(config.throttle_ms),
            max_redirects: config.max_redirects,
        })
    }

    async fn resolve_one(&self, url: String) -> Resolution {
        let mut current = url.clone();
        let mut stack: Vec<Hop> = Vec::new();

        for _ in 0..=self.max_redirects {
            let response = match self.client.get(&current).send().await {
                Ok(response) => response,
                Err(e) => {
                    let error = if e.is_timeout() {
                        ResolveError::Timeout
                    } else {
                        ResolveError::Connect {
                            details: e.to_string(),
                        }
                    };
                    return Resolution {
                        url,
                        stack,
                        error: Some(error),
                    };
                }
            };

            let status = response.status();
            stack.push(Hop {
                url: current.clone(),
                status: status.as_u16(),
            });

            if !status.is_redirection() {
                return Resolution {
                    url,
                    stack,
                    error: None,
                };
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let Some(location) = location else {
                return Resolution {
                    url,
                    stack,
                    error: Some(ResolveError::MissingLocation {
                        status: status.as_u16(),
                    }),
                };
            };

            // Location may be relative; resolve it against the hop we are on.
            current = match Url::parse(&current).and_then(|base| base.join(&location)) {
                Ok(next) => next.to_string(),
                Err(_) => {
                    return Resolution {
                        url,
                        stack,
                        error: Some(ResolveError::InvalidUrl { url: location }),
                    };
                }
            };
        }

        Resolution {
            url,
            stack,
            error: Some(ResolveError::TooManyRedirects {
                last_url: current,
            }),
        }
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve_all(&self, urls: Vec<String>) -> Vec<Resolution> {
        let total = urls.len();
        debug!("Resolving {} urls with concurrency {}", total, self.concurrency);

        stream::iter(urls)
            .map(|url| async move {
                let resolution = self.resolve_one(url).await;
                // Minimum inter-request delay per worker slot.
                tokio::time::sleep(self.throttle).await;
                resolution
            })
            .buffer_unordered(self.concurrency.min(total.max(1)))
            .collect()
            .await
    }
}
