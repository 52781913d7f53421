//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Endpoints can be overridden through configuration (see [`crate::config`]);
//! everything else here is fixed behaviour of the reconcilers.

/// Default Microsoft Graph base URL (the trust framework API only exists on beta)
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/beta";

/// Default Microsoft identity platform login host
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// OAuth2 scope requested for Graph access tokens
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Fixed client-side timeout applied to every Graph request (seconds)
pub const GRAPH_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Refresh cached access tokens this long before they expire (seconds)
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Static bearer token used when `PACT_MODE` is enabled
pub const PACT_MODE_TOKEN: &str = "test-token";

/// B2C error code returned when a key container does not exist in the directory
pub const KEY_CONTAINER_NOT_FOUND_CODE: &str = "AADB2C90073";

/// Reserved `value_version` that forces an upload on every reconciliation
pub const FORCE_UPLOAD_VERSION: i64 = -1;

/// Attribute on the root element that names a trust framework policy
pub const POLICY_ID_ATTRIBUTE: &str = "PolicyId";
