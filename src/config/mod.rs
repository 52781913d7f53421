//! # Configuration
//!
//! Directory (Microsoft Graph) connection settings loaded from environment variables.
//!
//! | Variable            | Default                              |
//! |---------------------|--------------------------------------|
//! | `IEF_TENANT_ID`     | required unless `PACT_MODE` is set   |
//! | `IEF_CLIENT_ID`     | required unless `PACT_MODE` is set   |
//! | `IEF_CLIENT_SECRET` | required unless `PACT_MODE` is set   |
//! | `GRAPH_ENDPOINT`    | `https://graph.microsoft.com/beta`   |
//! | `LOGIN_ENDPOINT`    | `https://login.microsoftonline.com`  |
//! | `PACT_MODE`         | unset                                |

use crate::constants::{DEFAULT_GRAPH_ENDPOINT, DEFAULT_LOGIN_ENDPOINT, PACT_MODE_TOKEN};
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// How the Graph client authenticates
#[derive(Clone)]
pub enum DirectoryAuth {
    /// OAuth2 client credentials grant against the tenant
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: Zeroizing<String>,
    },
    /// Fixed bearer token (contract tests and local mocks)
    Static(Zeroizing<String>),
}

impl std::fmt::Debug for DirectoryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Static(_) => f.write_str("Static(<redacted>)"),
        }
    }
}

/// Connection settings for the directory API
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Graph base URL, without trailing slash (e.g. `https://graph.microsoft.com/beta`)
    pub graph_endpoint: String,
    /// Login host used for token acquisition
    pub login_endpoint: String,
    pub auth: DirectoryAuth,
}

impl DirectoryConfig {
    /// Configuration with client-secret authentication against the public cloud
    pub fn new(tenant_id: String, client_id: String, client_secret: String) -> Self {
        Self {
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            auth: DirectoryAuth::ClientSecret {
                tenant_id,
                client_id,
                client_secret: Zeroizing::new(client_secret),
            },
        }
    }

    /// Configuration that talks to `graph_endpoint` with a fixed bearer token
    ///
    /// Used for Pact mock servers, where no token endpoint exists.
    pub fn with_static_token(graph_endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            graph_endpoint: normalize_endpoint(&graph_endpoint.into()),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            auth: DirectoryAuth::Static(Zeroizing::new(token.into())),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required credential variable is missing
    pub fn from_env() -> Result<Self> {
        let graph_endpoint =
            normalize_endpoint(&env_var_or_default_str("GRAPH_ENDPOINT", DEFAULT_GRAPH_ENDPOINT));
        let login_endpoint =
            normalize_endpoint(&env_var_or_default_str("LOGIN_ENDPOINT", DEFAULT_LOGIN_ENDPOINT));

        if env_var_or_default_bool("PACT_MODE", false) {
            return Ok(Self {
                graph_endpoint,
                login_endpoint,
                auth: DirectoryAuth::Static(Zeroizing::new(PACT_MODE_TOKEN.to_string())),
            });
        }

        let tenant_id = required_env("IEF_TENANT_ID")?;
        let client_id = required_env("IEF_CLIENT_ID")?;
        let client_secret = required_env("IEF_CLIENT_SECRET")?;

        Ok(Self {
            graph_endpoint,
            login_endpoint,
            ..Self::new(tenant_id, client_id, client_secret)
        })
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Environment variable {key} must be set"))
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_config_trims_trailing_slash() {
        let config = DirectoryConfig::with_static_token("http://127.0.0.1:1234/", "t");
        assert_eq!(config.graph_endpoint, "http://127.0.0.1:1234");
        assert!(matches!(config.auth, DirectoryAuth::Static(_)));
    }

    #[test]
    fn test_debug_output_redacts_client_secret() {
        let config = DirectoryConfig::new(
            "contoso.onmicrosoft.com".to_string(),
            "client".to_string(),
            "super-secret".to_string(),
        );
        let rendered = format!("{config:?}");
        assert!(rendered.contains("contoso.onmicrosoft.com"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_default_endpoints() {
        let config = DirectoryConfig::new("t".into(), "c".into(), "s".into());
        assert_eq!(config.graph_endpoint, DEFAULT_GRAPH_ENDPOINT);
        assert_eq!(config.login_endpoint, DEFAULT_LOGIN_ENDPOINT);
    }
}
