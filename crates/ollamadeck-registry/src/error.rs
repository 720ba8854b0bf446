//! Internal error types for registry fetches.
//!
//! These never cross the [`RegistryCatalog`] port: the client converts
//! them to empty result lists at the boundary and logs the detail.
//!
//! [`RegistryCatalog`]: ollamadeck_core::RegistryCatalog

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors related to fetching registry pages.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The page request came back with a non-success HTTP status.
    #[error("registry request failed with status {status}: {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Network, DNS, timeout or transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
