//! # Microsoft Graph Client
//!
//! Native REST implementation of [`DirectoryClient`](super::DirectoryClient)
//! on top of the Graph `beta/trustFramework` endpoints.
//!
//! This implementation:
//! - Uses reqwest with rustls and a fixed request timeout
//! - Authenticates with the client credentials grant (cached tokens)
//! - Works directly with Pact HTTP mock servers through a static token
//!
//! References:
//! - [trustFrameworkKeySet](https://learn.microsoft.com/graph/api/resources/trustframeworkkeyset)
//! - [trustFrameworkPolicy](https://learn.microsoft.com/graph/api/resources/trustframeworkpolicy)

mod auth;
mod operations;
mod requests;

use crate::config::DirectoryConfig;
use crate::constants::GRAPH_REQUEST_TIMEOUT_SECS;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::info;

use self::auth::TokenSource;

/// Graph-backed directory client
///
/// Construct once per process (or per tenant) and share through an `Arc`;
/// dropping it releases the connection pool and cached token.
pub struct GraphClient {
    http_client: Client,
    base_url: Url,
    tokens: TokenSource,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url.as_str())
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Create a new Graph client
    ///
    /// No token is requested until the first call.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the Graph
    /// endpoint is not an absolute URL
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.graph_endpoint)
            .with_context(|| format!("Invalid Graph endpoint: {}", config.graph_endpoint))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid Graph endpoint: {}", config.graph_endpoint);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(GRAPH_REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            graph_endpoint = %config.graph_endpoint,
            "Initializing Graph client"
        );

        let tokens = TokenSource::new(config.auth, config.login_endpoint, http_client.clone());

        Ok(Self {
            http_client,
            base_url,
            tokens,
        })
    }

    /// Append `segments` to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Graph endpoint {} cannot be a base URL", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
