//! The registry client: cache, fetch, scrape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use ollamadeck_core::{ModelTag, RegistryCatalog, RemoteModel};

use crate::cache::FetchCache;
use crate::config::RegistryConfig;
use crate::http::{PageFetcher, RegistryHttp};
use crate::scrape;

const MODELS_CACHE_KEY: &str = "models";

/// [`RegistryCatalog`] implementation over the registry website.
///
/// Lookup order is cache, then network. Only non-empty scrape results are
/// cached, so a transient outage or an unrecognized page layout never
/// poisons the cache for a day.
pub struct RegistryClient {
    fetcher: Arc<dyn PageFetcher>,
    cache: FetchCache,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Client with the production HTTP fetcher.
    #[must_use]
    pub fn new(config: RegistryConfig, cache: FetchCache) -> Self {
        let fetcher = Arc::new(RegistryHttp::new(&config));
        Self::with_fetcher(config, cache, fetcher)
    }

    /// Client with an injected fetcher. This is the testing seam.
    #[must_use]
    pub fn with_fetcher(
        config: RegistryConfig,
        cache: FetchCache,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            config,
        }
    }

    fn tags_cache_key(family: &str) -> String {
        format!("tags/{family}")
    }
}

#[async_trait]
impl RegistryCatalog for RegistryClient {
    async fn search_models(&self) -> Vec<RemoteModel> {
        if let Some(models) = self.cache.get::<Vec<RemoteModel>>(MODELS_CACHE_KEY) {
            return models;
        }

        let url = self.config.index_url();
        let page = match self.fetcher.fetch_page(&url).await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, "failed to fetch library index");
                return Vec::new();
            }
        };

        let models = scrape::parse_library_index(&page);
        if models.is_empty() {
            warn!(url, "library index yielded no models, not caching");
        } else {
            info!(count = models.len(), "fetched library index");
            self.cache.put(MODELS_CACHE_KEY, &models);
        }
        models
    }

    async fn fetch_tags(&self, family: &str) -> Vec<ModelTag> {
        let key = Self::tags_cache_key(family);
        if let Some(tags) = self.cache.get::<Vec<ModelTag>>(&key) {
            return tags;
        }

        let url = self.config.tags_url(family);
        let page = match self.fetcher.fetch_page(&url).await {
            Ok(page) => page,
            Err(e) => {
                error!(family, error = %e, "failed to fetch tag page");
                return Vec::new();
            }
        };

        let tags = scrape::parse_tags_page(&page);
        if tags.is_empty() {
            warn!(family, url, "tag page yielded no tags, not caching");
        } else {
            debug!(family, count = tags.len(), "fetched tag page");
            self.cache.put(&key, &tags);
        }
        tags
    }

    fn flush_cache(&self) {
        self.cache.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeFetcher;
    use tempfile::TempDir;

    const INDEX_PAGE: &str = r#"
<a href="/library/llama3.2">
  <p class="text-neutral-800 text-md">Meta&#39;s Llama 3.2</p>
  <span x-test-size>1b</span>
  <span x-test-size>3b</span>
</a>
"#;

    const TAGS_PAGE: &str = r#"
<input class="command hidden" value="llama3.2:1b" />
<p class="col-span-2 text-neutral-500 text-[13px]">1.3GB</p>
"#;

    fn client_with(dir: &TempDir, fetcher: FakeFetcher) -> (RegistryClient, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        let cache = FetchCache::new(dir.path(), 24 * 60 * 60);
        let client =
            RegistryClient::with_fetcher(RegistryConfig::new(), cache, fetcher.clone());
        (client, fetcher)
    }

    #[tokio::test]
    async fn search_fetches_and_parses_the_index() {
        let dir = TempDir::new().unwrap();
        let (client, _) = client_with(&dir, FakeFetcher::new().with_page("/library", INDEX_PAGE));

        let models = client.search_models().await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "llama3.2");
        assert_eq!(models[0].sizes, "1b, 3b");
    }

    #[tokio::test]
    async fn second_search_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let (client, fetcher) =
            client_with(&dir, FakeFetcher::new().with_page("/library", INDEX_PAGE));

        let first = client.search_models().await;
        let second = client.search_models().await;
        assert_eq!(first, second);
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty_and_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let (client, fetcher) = client_with(&dir, FakeFetcher::new());

        assert!(client.search_models().await.is_empty());
        // No poisoned cache: the next call tries the network again.
        assert!(client.search_models().await.is_empty());
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn unrecognized_page_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let (client, fetcher) = client_with(
            &dir,
            FakeFetcher::new().with_page("/library", "<html>redesigned</html>"),
        );

        assert!(client.search_models().await.is_empty());
        assert!(client.search_models().await.is_empty());
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn tags_are_fetched_per_family_and_cached() {
        let dir = TempDir::new().unwrap();
        let (client, fetcher) = client_with(
            &dir,
            FakeFetcher::new().with_page("/library/llama3.2/tags", TAGS_PAGE),
        );

        let tags = client.fetch_tags("llama3.2").await;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag, "llama3.2:1b");

        let again = client.fetch_tags("llama3.2").await;
        assert_eq!(tags, again);
        assert_eq!(fetcher.request_count(), 1);

        // A different family is its own cache entry.
        assert!(client.fetch_tags("qwen2.5").await.is_empty());
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn flush_forces_a_refetch() {
        let dir = TempDir::new().unwrap();
        let (client, fetcher) =
            client_with(&dir, FakeFetcher::new().with_page("/library", INDEX_PAGE));

        client.search_models().await;
        client.flush_cache();
        client.search_models().await;
        assert_eq!(fetcher.request_count(), 2);
    }
}
