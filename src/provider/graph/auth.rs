//! # Graph Authentication
//!
//! Acquires and caches OAuth2 access tokens for Microsoft Graph using the
//! client credentials grant. Tokens are refreshed shortly before they expire,
//! and dropped early when Graph rejects them with 401.

use crate::config::DirectoryAuth;
use crate::constants::{GRAPH_SCOPE, TOKEN_REFRESH_MARGIN_SECS};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Fallback lifetime when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// OAuth2 token response from the identity platform
///
/// Endpoint: `POST {login}/{tenant}/oauth2/v2.0/token`
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: Zeroizing<String>,
    refresh_at: Instant,
}

pub(super) struct TokenSource {
    auth: DirectoryAuth,
    login_endpoint: String,
    http_client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("auth", &self.auth)
            .field("login_endpoint", &self.login_endpoint)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    pub(super) fn new(auth: DirectoryAuth, login_endpoint: String, http_client: Client) -> Self {
        Self {
            auth,
            login_endpoint,
            http_client,
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a new one if the cache is empty or stale
    pub(super) async fn bearer(&self) -> Result<Zeroizing<String>> {
        let (tenant_id, client_id, client_secret) = match &self.auth {
            DirectoryAuth::Static(token) => return Ok(token.clone()),
            DirectoryAuth::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
        };

        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
            debug!("Cached Graph token is about to expire, refreshing");
        }

        let fresh = self
            .fetch(tenant_id, client_id, client_secret.as_str())
            .await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Forget the cached token so the next request fetches a new one
    pub(super) async fn invalidate(&self) {
        if matches!(self.auth, DirectoryAuth::ClientSecret { .. }) {
            *self.cached.lock().await = None;
        }
    }

    async fn fetch(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<CachedToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.login_endpoint, tenant_id);
        debug!(tenant_id = tenant_id, client_id = client_id, "Requesting Graph access token");

        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("Failed to request Graph access token")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token endpoint returned {status}: {body}");
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        let refresh_at =
            Instant::now() + lifetime.saturating_sub(Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS));
        info!(
            tenant_id = tenant_id,
            expires_in_secs = lifetime.as_secs(),
            "Acquired Graph access token"
        );

        Ok(CachedToken {
            token: Zeroizing::new(parsed.access_token),
            refresh_at,
        })
    }
}
