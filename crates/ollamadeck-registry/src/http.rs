//! HTTP page fetching.
//!
//! The [`PageFetcher`] trait exists for dependency injection: the client
//! is unit-tested against canned pages without touching the network. The
//! production implementation is a thin reqwest wrapper — no retry logic,
//! because fetch failures are fail-soft and successful results are cached
//! for a day anyway.

use async_trait::async_trait;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};

/// Trait for fetching a page body from a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page and return its body as text.
    async fn fetch_page(&self, url: &str) -> RegistryResult<String>;
}

/// Production fetcher using reqwest with the configured timeout and
/// client-identifier header.
pub struct RegistryHttp {
    client: reqwest::Client,
}

impl RegistryHttp {
    /// Build a fetcher from the registry configuration.
    #[must_use]
    pub fn new(config: &RegistryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .expect("failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for RegistryHttp {
    async fn fetch_page(&self, url: &str) -> RegistryResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A fake fetcher that returns canned pages and records requests.
    pub struct FakeFetcher {
        pages: HashMap<String, String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        #[must_use]
        pub fn new() -> Self {
            Self {
                pages: HashMap::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Serve `body` for URLs containing `url_contains`.
        #[must_use]
        pub fn with_page(mut self, url_contains: &str, body: &str) -> Self {
            self.pages.insert(url_contains.to_string(), body.to_string());
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Default for FakeFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_page(&self, url: &str) -> RegistryResult<String> {
            self.requests.lock().unwrap().push(url.to_string());
            for (pattern, body) in &self.pages {
                if url.contains(pattern) {
                    return Ok(body.clone());
                }
            }
            Err(RegistryError::Status {
                status: 404,
                url: url.to_string(),
            })
        }
    }
}
