//! Remote registry access for ollamadeck.
//!
//! The registry is a third-party website, not an API: model families are
//! extracted from its library index page and tags from per-family detail
//! pages via structural text markers. Everything here fails soft — a
//! network fault or a markup shift yields an empty list plus a logged
//! error, never a fault in the caller. Successful fetches are cached on
//! disk for 24 hours.
//!
//! Modules:
//! - [`scrape`] — pure markup-to-records extraction, testable offline
//! - [`http`] — the page fetcher (reqwest, 15 s timeout, client header)
//! - [`cache`] — time-boxed JSON cache, one file per resource key
//! - [`client`] — [`RegistryCatalog`] port implementation tying it together
//!
//! [`RegistryCatalog`]: ollamadeck_core::RegistryCatalog

pub mod cache;
mod client;
mod config;
mod error;
pub mod http;
pub mod scrape;

pub use cache::FetchCache;
pub use client::RegistryClient;
pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use http::PageFetcher;
