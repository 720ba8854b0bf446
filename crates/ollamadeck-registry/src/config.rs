//! Public configuration for the registry client.

use std::time::Duration;

use ollamadeck_core::Settings;

/// Configuration for [`RegistryClient`](crate::RegistryClient).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the registry website (no trailing slash).
    pub(crate) base_url: String,
    /// Client identifier sent with every request.
    pub(crate) user_agent: String,
    /// Hard timeout per page fetch.
    pub(crate) timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: ollamadeck_core::DEFAULT_REGISTRY_URL.to_string(),
            user_agent: concat!("ollamadeck/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive configuration from application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new().with_base_url(settings.effective_registry_url())
    }

    /// Set the registry base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the user agent string for HTTP requests.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the per-request timeout. Defaults to 15 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of the library index page.
    #[must_use]
    pub fn index_url(&self) -> String {
        format!("{}/library", self.base_url)
    }

    /// URL of the tag page for one model family.
    #[must_use]
    pub fn tags_url(&self, family: &str) -> String {
        format!("{}/library/{family}/tags", self.base_url)
    }
}
