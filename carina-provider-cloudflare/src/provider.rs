//! Cloudflare Provider
//!
//! Holds the API client handed to every resource operation.

use crate::client::{ApiResult, CloudflareClient};
use crate::config::ProviderConfig;

/// Cloudflare Provider
///
/// Generic over the client so lifecycle code can run against any
/// [`AccessCaCertificateApi`](crate::client::AccessCaCertificateApi)
/// implementation.
pub struct CloudflareProvider<C = CloudflareClient> {
    client: C,
}

impl CloudflareProvider {
    /// Create a provider talking to the Cloudflare API
    pub fn new(config: &ProviderConfig) -> ApiResult<Self> {
        Ok(Self::with_client(CloudflareClient::new(config)?))
    }
}

impl<C> CloudflareProvider<C> {
    pub fn with_client(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}
